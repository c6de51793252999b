// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::result::Result;

use crate::types::{
    service_types::{ApplicationDescription, ApplicationType},
    LocalizedText,
};

/// Failure to load or save a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration is not valid")]
    Invalid,
    #[error("cannot access configuration file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot (de)serialize configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// A trait that handles the loading / saving and validity of configuration information for a
/// client.
pub trait Config: serde::Serialize {
    fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if !self.is_valid() {
            error!("Config isn't valid and won't be saved");
            return Err(ConfigError::Invalid);
        }
        let s = serde_yaml::to_string(&self)?;
        let io_err = |source| ConfigError::Io {
            path: path.to_string_lossy().to_string(),
            source,
        };
        let mut f = File::create(path).map_err(io_err)?;
        f.write_all(s.as_bytes()).map_err(|source| {
            error!("Could not save config - error = {:?}", source);
            ConfigError::Io {
                path: path.to_string_lossy().to_string(),
                source,
            }
        })
    }

    fn load<A>(path: &Path) -> Result<A, ConfigError>
    where
        for<'de> A: Config + serde::Deserialize<'de>,
    {
        let io_err = |source| {
            error!("Cannot open configuration file {}", path.to_string_lossy());
            ConfigError::Io {
                path: path.to_string_lossy().to_string(),
                source,
            }
        };
        let mut f = File::open(path).map_err(io_err)?;
        let mut s = String::new();
        f.read_to_string(&mut s).map_err(io_err)?;
        serde_yaml::from_str(&s).map_err(|err| {
            error!(
                "Cannot deserialize configuration from {}, error reason: {}",
                path.to_string_lossy(),
                err
            );
            ConfigError::Yaml(err)
        })
    }

    fn is_valid(&self) -> bool;

    fn application_name(&self) -> String;

    fn application_uri(&self) -> String;

    fn product_uri(&self) -> String;

    fn application_type(&self) -> ApplicationType;

    fn discovery_urls(&self) -> Option<Vec<String>> {
        None
    }

    fn application_description(&self) -> ApplicationDescription {
        ApplicationDescription {
            application_uri: self.application_uri(),
            application_name: LocalizedText::new("", &self.application_name()),
            application_type: self.application_type(),
            product_uri: self.product_uri(),
            gateway_server_uri: None,
            discovery_profile_uri: None,
            discovery_urls: self.discovery_urls(),
        }
    }
}
