//! Client/server version compatibility.
//!
//! Two released versions are compatible when their major versions match
//! and, below 1.0, their minor versions match too. Development builds
//! (pre-release tagged `dev`) are compatible with everything so local
//! checkouts can talk to any server.

use semver::Version;

/// Version of the workspace crates, shared by server and client.
pub const PACKAGE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionError {
    #[error("Invalid {side} version '{version}': {reason}")]
    Invalid {
        side: &'static str,
        version: String,
        reason: String,
    },

    #[error(
        "Client version {client} is not compatible with server version {server}; \
         upgrade the older side so both share a release line"
    )]
    Incompatible { client: String, server: String },
}

fn parse(side: &'static str, version: &str) -> Result<Version, VersionError> {
    Version::parse(version.trim()).map_err(|e| VersionError::Invalid {
        side,
        version: version.to_string(),
        reason: e.to_string(),
    })
}

fn is_dev(version: &Version) -> bool {
    version.pre.as_str().split('.').any(|part| part == "dev")
}

/// Fail unless `client` can talk to `server`.
pub fn check_compatible(client: &str, server: &str) -> Result<(), VersionError> {
    let client_version = parse("client", client)?;
    let server_version = parse("server", server)?;

    if is_dev(&client_version) || is_dev(&server_version) {
        return Ok(());
    }

    let same_line = client_version.major == server_version.major
        && (client_version.major > 0 || client_version.minor == server_version.minor);

    if same_line {
        Ok(())
    } else {
        Err(VersionError::Incompatible {
            client: client.to_string(),
            server: server.to_string(),
        })
    }
}
