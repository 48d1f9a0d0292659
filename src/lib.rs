/*!
# Payslip Signer

A small web service where employees sign their payslips in the browser.

## Overview

The roster of employees lives in a Google Sheets spreadsheet: one row per
employee with their name, a link to their payslip on Google Drive, a password
and a cell that receives the link to the signed copy. An employee picks their
name, types their password, draws a signature on a canvas and gets back a PDF
with the signature stamped onto page one. The signed PDF is uploaded to a Drive
folder and its link is written back into the roster.

## Workflow

1. **Login** - roster row looked up by name (first match), password checked,
   payslip downloaded and kept in the session
2. **Draw** - the canvas is exported as a PNG data URL
3. **Stamp** - white canvas background keyed out (R, G, B > 200 become
   transparent), then a label, the signature and the signing time are drawn
   at fixed coordinates on page one
4. **Upload** - the stamped PDF is stored as `<name>_holerite_assinado.pdf`
5. **Record** - its web link is written into the roster (column G by default)

## Modules

- **config**: environment / JSON configuration
- **error**: crate error type
- **roster**: roster parsing, row lookup, A1 helpers, Drive link parsing
- **auth**: password check and in-memory sessions
- **stamp**: background removal and the PDF overlay
- **google**: Sheets and Drive clients, service-account tokens
- **backend**: storage traits and their Google implementation
- **signing**: login and signing workflow on top of a backend
- **app**: axum routes (feature `web`)

## Routes

- `GET /login`, `POST /login` - roster login
- `GET /sign` - signature canvas
- `GET /document` - the unsigned payslip held in the session
- `POST /api/sign` - stamp, upload and record
- `POST /logout` - end the session
*/

pub mod auth;
pub mod backend;
pub mod config;
pub mod error;
pub mod google;
pub mod roster;
pub mod signing;
pub mod stamp;

#[cfg(feature = "web")]
pub mod app;

pub use error::{Error, Result};
