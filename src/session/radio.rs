use super::{RadioSession, SessionError};
use crate::config::RadioCredentials;
use chrono::Local;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Serialize)]
struct LinkRecord<'a> {
    radio: &'a str,
    imei: &'a str,
    account: &'a str,
    connected_at: String,
    disconnected_at: Option<String>,
}

/// Radio link authenticated against the carrier's mail gateway.
///
/// Connecting checks the credential record and writes a link record into the
/// run directory; the mail transport itself lives outside this crate.
pub struct CredentialedRadio {
    radio_name: String,
    record_path: PathBuf,
    imei: Option<String>,
    account: String,
    connected_at: String,
}

impl CredentialedRadio {
    pub fn new(radio_name: &str, run_dir: &Path) -> Self {
        Self {
            radio_name: radio_name.to_string(),
            record_path: run_dir.join(format!("{}.json", radio_name)),
            imei: None,
            account: String::new(),
            connected_at: String::new(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.imei.is_some()
    }

    fn write_record(&self, disconnected_at: Option<String>) -> Result<(), SessionError> {
        let imei = self.imei.as_deref().unwrap_or_default();
        let record = LinkRecord {
            radio: &self.radio_name,
            imei,
            account: &self.account,
            connected_at: self.connected_at.clone(),
            disconnected_at,
        };
        let json = serde_json::to_string_pretty(&record)
            .map_err(|e| SessionError::Io(std::io::Error::other(e)))?;
        fs::write(&self.record_path, json)?;
        Ok(())
    }
}

impl RadioSession for CredentialedRadio {
    fn connect(&mut self, imei: &str, credentials: &RadioCredentials) -> Result<(), SessionError> {
        let username = credentials
            .email_username
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| SessionError::Credentials("email_username is empty".to_string()))?;
        if credentials.email_password.as_deref().map_or(true, str::is_empty) {
            return Err(SessionError::Credentials("email_password is empty".to_string()));
        }
        if imei.is_empty() || !imei.chars().all(|c| c.is_ascii_digit()) {
            return Err(SessionError::Credentials(format!("'{}' is not a valid IMEI", imei)));
        }

        self.imei = Some(imei.to_string());
        self.account = username.to_string();
        self.connected_at = Local::now().to_rfc3339();
        if let Err(e) = self.write_record(None) {
            self.imei = None;
            return Err(e);
        }

        info!("{} linked to IMEI {} via {}", self.radio_name, imei, username);
        Ok(())
    }

    fn disconnect(&mut self) {
        if !self.is_connected() {
            return;
        }
        if let Err(e) = self.write_record(Some(Local::now().to_rfc3339())) {
            warn!("{}: could not finalize link record: {}", self.radio_name, e);
        }
        self.imei = None;
        info!("{} disconnected", self.radio_name);
    }
}
