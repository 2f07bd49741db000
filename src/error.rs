use std::path::PathBuf;

/// Domain failures raised by the account store, the resolver and the
/// installation locator.
///
/// Filesystem failures are not listed here; they travel as plain
/// `anyhow::Error` with path context attached.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SwitchError {
    #[error("No game installation could be found")]
    NoInstallationFound,
    #[error("More than one game installation was found, this is currently unsupported")]
    AmbiguousInstallation(Vec<PathBuf>),
    #[error("Could not determine the active account id, did you log into the game yet?")]
    NoActiveAccount,
    #[error("Could not read the active credential file, did you log into the game yet?")]
    NoCredentialBlob,
    #[error("Unknown account '{token}'")]
    UnknownAccount { token: String, known: Vec<String> },
    #[error("No stored credentials for account '{0}'")]
    NoStoredCredential(String),
    #[error("No account selected")]
    AmbiguousSelection(Vec<String>),
    #[error("Invalid account id '{0}'")]
    InvalidAccountId(String),
}

impl SwitchError {
    /// Accounts the caller should offer as a menu, if this error carries any.
    pub fn candidates(&self) -> Option<&[String]> {
        match self {
            Self::UnknownAccount { known, .. } => Some(known),
            Self::AmbiguousSelection(known) => Some(known),
            _ => None,
        }
    }
}
