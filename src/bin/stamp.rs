//! Stamp a signature onto a local PDF without touching Google.
//!
//! Usage: `stamp <payslip.pdf> <signature.png> <output.pdf>`

use chrono::Local;
use payslip_signer::stamp::{StampLayout, sign_pdf};
use std::env;
use std::fs;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 4 {
        let program = args.first().map(String::as_str).unwrap_or("stamp");
        eprintln!("Usage: {} <payslip.pdf> <signature.png> <output.pdf>", program);
        std::process::exit(2);
    }

    let pdf = fs::read(&args[1])?;
    let signature = fs::read(&args[2])?;

    let signed = sign_pdf(
        &pdf,
        &signature,
        Local::now().naive_local(),
        &StampLayout::default(),
    )?;
    fs::write(&args[3], &signed)?;

    log::info!("wrote {} ({} bytes)", args[3], signed.len());
    Ok(())
}
