use chrono::NaiveDateTime;
use std::sync::Arc;
use std::time::SystemTime;

use crate::auth::{Session, verify_password};
use crate::backend::{DocumentStore, RosterStore};
use crate::error::{Error, Result};
use crate::roster::extract_file_id;
use crate::stamp::{StampLayout, sign_pdf, signed_file_name};

/// Result of a signing request whose upload went through
#[derive(Debug, Clone, PartialEq)]
pub enum SignOutcome {
    /// Uploaded and written back into the roster
    Recorded { file_id: String, link: String },

    /// Uploaded, but the roster cell could not be updated
    Unrecorded {
        file_id: String,
        link: String,
        reason: String,
    },
}

impl SignOutcome {
    pub fn link(&self) -> &str {
        match self {
            SignOutcome::Recorded { link, .. } | SignOutcome::Unrecorded { link, .. } => link,
        }
    }
}

/// Authenticate `name` and fetch their payslip
///
/// Unknown names and wrong passwords both yield `Error::AuthenticationFailed`
/// so the login form does not reveal which one was wrong.
///
/// The returned session is not yet stored; `SessionStore::create` sets its expiry.
pub async fn login<B>(backend: &B, name: &str, password: &str) -> Result<Session>
where
    B: RosterStore + DocumentStore,
{
    let roster = backend.load_roster().await?;

    let employee = match roster.find(name) {
        Some(employee) if verify_password(password, &employee.password) => employee,
        _ => {
            log::warn!("failed login attempt for {:?}", name);
            return Err(Error::AuthenticationFailed);
        }
    };

    let file_id = extract_file_id(&employee.document_link)?;
    let document = backend.download(&file_id).await?;
    log::info!(
        "{} logged in, fetched {} ({} bytes)",
        employee.name,
        file_id,
        document.len()
    );

    Ok(Session {
        employee: employee.name.clone(),
        row: employee.row,
        document_link: employee.document_link.clone(),
        file_id,
        email: employee.email.clone(),
        document: Arc::new(document),
        expires_at: SystemTime::UNIX_EPOCH,
    })
}

/// Stamp the session's payslip with `signature`, upload it and record its link
///
/// # Errors
/// Anything that stops the upload: bad signature, unreadable PDF, Drive failure.
/// A failed roster update after a successful upload is reported through
/// `SignOutcome::Unrecorded` instead.
pub async fn sign<B>(
    backend: &B,
    session: &Session,
    signature: &[u8],
    signed_at: NaiveDateTime,
    layout: &StampLayout,
) -> Result<SignOutcome>
where
    B: RosterStore + DocumentStore,
{
    let signed = sign_pdf(&session.document, signature, signed_at, layout)?;
    let name = signed_file_name(&session.employee);

    let uploaded = backend.upload_signed(&name, signed).await?;
    let link = uploaded.link();

    if let Some(email) = &session.email {
        if let Err(e) = backend.share_with_reader(&uploaded.id, email).await {
            log::warn!("could not share {} with {}: {}", uploaded.id, email, e);
        }
    }

    match backend.record_signed_link(&session.employee, &link).await {
        Ok(_) => Ok(SignOutcome::Recorded {
            file_id: uploaded.id,
            link,
        }),
        Err(e) => {
            log::error!(
                "signed file {} uploaded but roster update failed for {}: {}",
                uploaded.id,
                session.employee,
                e
            );
            Ok(SignOutcome::Unrecorded {
                file_id: uploaded.id,
                link,
                reason: e.to_string(),
            })
        }
    }
}
