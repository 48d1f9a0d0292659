use std::future::Future;
use std::sync::Arc;

use crate::config::{Config, RosterLayout};
use crate::error::{Error, Result};
use crate::google::{Authenticator, DriveClient, SheetsClient, UploadedFile};
use crate::roster::{Roster, cell_range, column_range, on_sheet, row_for_name, sheet_prefix};

/// Source of the employee roster and sink for signed-document links
pub trait RosterStore: Send + Sync {
    fn load_roster(&self) -> impl Future<Output = Result<Roster>> + Send;

    /// Write `link` into the signed-link cell of `employee`; returns the row written
    fn record_signed_link(
        &self,
        employee: &str,
        link: &str,
    ) -> impl Future<Output = Result<usize>> + Send;
}

/// Where payslips are fetched from and signed copies are stored
pub trait DocumentStore: Send + Sync {
    fn download(&self, file_id: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;

    fn upload_signed(
        &self,
        name: &str,
        pdf: Vec<u8>,
    ) -> impl Future<Output = Result<UploadedFile>> + Send;

    fn share_with_reader(
        &self,
        file_id: &str,
        email: &str,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Everything the web layer needs from the outside world
pub trait Backend: RosterStore + DocumentStore + 'static {}

impl<T: RosterStore + DocumentStore + 'static> Backend for T {}

/// Roster in Google Sheets, documents in Google Drive
#[derive(Debug, Clone)]
pub struct GoogleWorkspace {
    sheets: SheetsClient,
    drive: DriveClient,
    layout: RosterLayout,
    roster_range: String,
    signed_folder_id: String,
}

impl GoogleWorkspace {
    /// # Errors
    /// * `Error::Config` when no credentials are configured
    /// * `Error::Credentials` when the service-account key cannot be parsed
    pub fn from_config(config: &Config) -> Result<Self> {
        let source = config
            .credentials
            .as_ref()
            .ok_or_else(|| Error::Config("no Google credentials configured".to_string()))?;

        let http = reqwest::Client::new();
        let auth = Arc::new(Authenticator::new(source, http.clone())?);

        Ok(GoogleWorkspace {
            sheets: SheetsClient::new(
                http.clone(),
                auth.clone(),
                &config.endpoints.sheets,
                &config.spreadsheet_id,
            ),
            drive: DriveClient::new(
                http,
                auth,
                &config.endpoints.drive,
                &config.endpoints.drive_upload,
            ),
            layout: config.layout.clone(),
            roster_range: config.roster_range.clone(),
            signed_folder_id: config.signed_folder_id.clone(),
        })
    }
}

impl RosterStore for GoogleWorkspace {
    async fn load_roster(&self) -> Result<Roster> {
        let values = self.sheets.get_values(&self.roster_range).await?;
        let roster = Roster::from_values(&values, &self.layout);
        log::info!("loaded roster with {} employees", roster.len());
        Ok(roster)
    }

    async fn record_signed_link(&self, employee: &str, link: &str) -> Result<usize> {
        // Lookup and write stay on the sheet the roster was read from
        let sheet = sheet_prefix(&self.roster_range);

        // Re-read the name column so the row is current even if the sheet changed since login
        let names = self
            .sheets
            .get_values(&on_sheet(sheet, &column_range(self.layout.name_column)))
            .await?;
        let row = row_for_name(&names, employee)
            .ok_or_else(|| Error::EmployeeNotFound(employee.to_string()))?;

        let range = on_sheet(sheet, &cell_range(self.layout.signed_column, row));
        self.sheets.update_cell(&range, link).await?;
        log::info!("recorded signed link for {} in {}", employee, range);
        Ok(row)
    }
}

impl DocumentStore for GoogleWorkspace {
    async fn download(&self, file_id: &str) -> Result<Vec<u8>> {
        self.drive.download(file_id).await
    }

    async fn upload_signed(&self, name: &str, pdf: Vec<u8>) -> Result<UploadedFile> {
        let file = self
            .drive
            .upload_pdf(name, &self.signed_folder_id, pdf)
            .await?;
        log::info!("uploaded {} as {}", name, file.id);
        Ok(file)
    }

    async fn share_with_reader(&self, file_id: &str, email: &str) -> Result<()> {
        self.drive.share_with_reader(file_id, email).await
    }
}
