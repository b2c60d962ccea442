//! Boot script embedded in launch template versions
//!
//! New fleet members run this script on boot: pull the image, replace the
//! `app` container and wait for its health endpoint. The image is also
//! written as an explicit `FLEET_IMAGE=` field so existing versions can be
//! matched to an image exactly.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::errors::FleetError;
use crate::models::{Environment, FleetSpec};

/// Field line carrying the image reference
pub const IMAGE_FIELD: &str = "FLEET_IMAGE=";

/// Boot script for one image and environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootScript {
    image: String,
    environment: Environment,
}

impl BootScript {
    /// Fails with `ValidationError` if the image reference contains
    /// characters that are not valid in an image reference
    pub fn new(image: &str, environment: Environment) -> Result<Self, FleetError> {
        validate_image(image)?;
        Ok(Self {
            image: image.to_string(),
            environment,
        })
    }

    pub fn render(&self) -> String {
        format!(
            r#"#!/bin/bash
set -e

{field}{image}
FLEET_ENVIRONMENT={environment}

# Pull new image
docker pull "$FLEET_IMAGE"

# Stop old container
docker stop app || true
docker rm app || true

# Run new container
docker run -d \
  --name app \
  --restart unless-stopped \
  -p 3000:3000 \
  -e NODE_ENV="$FLEET_ENVIRONMENT" \
  "$FLEET_IMAGE"

# Wait for health check
for i in {{1..30}}; do
  if curl -f http://localhost:3000/health > /dev/null 2>&1; then
    echo "Application is healthy!"
    exit 0
  fi
  sleep 2
done

echo "Application failed to start"
exit 1
"#,
            field = IMAGE_FIELD,
            image = self.image,
            environment = self.environment,
        )
    }

    /// Base64 user data for a launch template version
    pub fn encode(&self) -> String {
        STANDARD.encode(self.render())
    }
}

/// Decode base64 user data back into the script text
pub fn decode(user_data: &str) -> Result<String, FleetError> {
    let bytes = STANDARD
        .decode(user_data.trim())
        .map_err(|e| FleetError::ValidationError(format!("User data is not base64: {}", e)))?;
    String::from_utf8(bytes)
        .map_err(|e| FleetError::ValidationError(format!("User data is not UTF-8: {}", e)))
}

/// Image named by the script's `FLEET_IMAGE=` field, if it has one
pub fn embedded_image(script: &str) -> Option<&str> {
    script
        .lines()
        .find_map(|line| line.trim().strip_prefix(IMAGE_FIELD))
        .map(|value| value.trim().trim_matches(|c| c == '"' || c == '\''))
        .filter(|value| !value.is_empty())
}

/// Whether a launch spec runs `image`.
///
/// Scripts written by [`BootScript`] are matched on their image field
/// exactly. Scripts created elsewhere fall back to a substring search.
pub fn references_image(spec: &FleetSpec, image: &str) -> bool {
    let script = decode(&spec.user_data).unwrap_or_else(|_| spec.user_data.clone());
    match embedded_image(&script) {
        Some(found) => found == image,
        None => script.contains(image),
    }
}

fn validate_image(image: &str) -> Result<(), FleetError> {
    let valid = !image.is_empty()
        && image
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ':' | '/' | '@'));
    if !valid {
        return Err(FleetError::ValidationError(format!(
            "Invalid image reference: {:?}",
            image
        )));
    }
    Ok(())
}
