use lazy_static::lazy_static;
use regex::Regex;

use crate::config::RosterLayout;
use crate::error::{Error, Result};

lazy_static! {
    static ref ID_QUERY_REGEX: Regex = Regex::new(r"[?&]id=([A-Za-z0-9_-]+)").unwrap();
}

/// One employee row of the roster sheet
#[derive(Debug, Clone, PartialEq)]
pub struct Employee {
    /// 1-based row number in the sheet (the header is row 1)
    pub row: usize,
    pub name: String,
    /// Link to the unsigned payslip
    pub document_link: String,
    /// Link to the signed payslip, empty until signed
    pub signed_link: String,
    pub password: String,
    pub email: Option<String>,
}

/// Employees read from the roster sheet, in sheet order
#[derive(Debug, Clone, Default)]
pub struct Roster {
    employees: Vec<Employee>,
}

impl Roster {
    /// Build a roster from the raw `values` grid of the Sheets API
    ///
    /// The first row is the header. The Sheets API drops trailing empty cells,
    /// so short rows read as empty strings. Rows without a name are skipped.
    ///
    /// # Examples
    /// ```
    /// use payslip_signer::config::RosterLayout;
    /// use payslip_signer::roster::Roster;
    ///
    /// let values = vec![
    ///     vec!["NOME".to_string()],
    ///     vec!["Ana".to_string()],
    /// ];
    /// let roster = Roster::from_values(&values, &RosterLayout::default());
    /// assert_eq!(roster.names(), vec!["Ana".to_string()]);
    /// ```
    pub fn from_values(values: &[Vec<String>], layout: &RosterLayout) -> Self {
        let Some((_header, rows)) = values.split_first() else {
            return Roster::default();
        };

        let employees = rows
            .iter()
            .enumerate()
            .filter_map(|(i, row)| {
                let name = cell(row, layout.name_column);
                if name.trim().is_empty() {
                    return None;
                }
                let email = layout
                    .email_column
                    .map(|c| cell(row, c).trim().to_string())
                    .filter(|e| !e.is_empty());
                Some(Employee {
                    // +1 for the header, +1 for 1-based rows
                    row: i + 2,
                    name,
                    document_link: cell(row, layout.document_column),
                    signed_link: cell(row, layout.signed_column),
                    password: cell(row, layout.password_column),
                    email,
                })
            })
            .collect();

        Roster { employees }
    }

    pub fn is_empty(&self) -> bool {
        self.employees.is_empty()
    }

    pub fn len(&self) -> usize {
        self.employees.len()
    }

    /// Names for the login selector, in roster order
    pub fn names(&self) -> Vec<String> {
        self.employees.iter().map(|e| e.name.clone()).collect()
    }

    /// First employee whose name matches exactly
    pub fn find(&self, name: &str) -> Option<&Employee> {
        self.employees.iter().find(|e| e.name == name)
    }

    pub fn employees(&self) -> &[Employee] {
        &self.employees
    }
}

fn cell(row: &[String], column: usize) -> String {
    row.get(column).cloned().unwrap_or_default()
}

/// Find the 1-based row of `name` in a single column read from the sheet
///
/// The first entry is the header and is never matched. Empty entries (rows the
/// API returned as `[]`) are skipped.
pub fn row_for_name(column: &[Vec<String>], name: &str) -> Option<usize> {
    column
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, row)| row.first().map(|v| v == name).unwrap_or(false))
        .map(|(i, _)| i + 1)
}

/// Convert a 0-based column index to its letter (0 = A, 25 = Z, 26 = AA)
pub fn column_letter(index: usize) -> String {
    let mut name = String::new();
    let mut n = index + 1;

    while n > 0 {
        n -= 1;
        name.insert(0, (b'A' + (n % 26) as u8) as char);
        n /= 26;
    }

    name
}

/// Convert a column letter to its 0-based index (A = 0), case-insensitive
pub fn column_index(letter: &str) -> Option<usize> {
    let letter = letter.trim();
    if letter.is_empty() {
        return None;
    }
    let mut n = 0usize;
    for c in letter.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        n = n * 26 + (c.to_ascii_uppercase() as u8 - b'A') as usize + 1;
    }
    Some(n - 1)
}

/// A1 notation for a single cell, e.g. `cell_range(6, 7) == "G7"`
pub fn cell_range(column: usize, row: usize) -> String {
    format!("{}{}", column_letter(column), row)
}

/// A1 notation for a whole column, e.g. `column_range(0) == "A:A"`
pub fn column_range(column: usize) -> String {
    let letter = column_letter(column);
    format!("{}:{}", letter, letter)
}

/// Sheet part of an A1 range: `Some("Folha")` for `"Folha!A1:H"`, `None` for `"A1:H"`
pub fn sheet_prefix(range: &str) -> Option<&str> {
    range
        .rsplit_once('!')
        .map(|(sheet, _)| sheet)
        .filter(|sheet| !sheet.is_empty())
}

/// Qualify `range` with `sheet`, e.g. `on_sheet(Some("Folha"), "G7") == "Folha!G7"`
pub fn on_sheet(sheet: Option<&str>, range: &str) -> String {
    match sheet {
        Some(sheet) => format!("{}!{}", sheet, range),
        None => range.to_string(),
    }
}

/// Extract the Drive file id from a sharing link
///
/// Links look like `https://drive.google.com/file/d/<ID>/view?usp=sharing`; the
/// id is the second-to-last path segment. `open?id=<ID>` links are accepted too.
///
/// # Errors
/// * `Error::InvalidDocumentLink` when no id can be found
pub fn extract_file_id(link: &str) -> Result<String> {
    let trimmed = link.trim();

    if let Some(caps) = ID_QUERY_REGEX.captures(trimmed) {
        return Ok(caps[1].to_string());
    }

    let segments: Vec<&str> = trimmed.split('/').collect();
    if segments.len() >= 2 {
        let candidate = segments[segments.len() - 2];
        if !candidate.is_empty() && !candidate.contains(':') {
            return Ok(candidate.to_string());
        }
    }

    Err(Error::InvalidDocumentLink(link.to_string()))
}
