//! Command-line interface for the passkit pass signer.
//!
//! Generates signed `.pkpass` archives from a model directory and verifies
//! existing archives against a trusted WWDR certificate.

use clap::{Args, Parser, Subcommand};
use passkit::schema::{Overrides, TransitType};
use passkit::{
    create_pass, verify_pkpass, Barcodes, DigestAlgorithm, IdentitySource, Translations,
    TrustStore,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "passkit")]
#[command(about = "Wallet pass assembly and signing tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a signed .pkpass from a model directory
    Generate(GenerateArgs),
    /// Check the manifest and signature of a .pkpass
    Verify(VerifyArgs),
}

#[derive(Args)]
struct GenerateArgs {
    /// Model directory (".pass" is appended when there is no extension)
    model: PathBuf,

    /// Output file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// WWDR intermediate certificate (PEM or DER)
    #[arg(short = 'w', long)]
    wwdr: PathBuf,

    /// Signer certificate (PEM format)
    #[arg(short = 'c', long, requires = "private_key", conflicts_with = "pkcs12")]
    certificate: Option<PathBuf>,

    /// Signer private key (PEM format)
    #[arg(short = 'k', long, requires = "certificate")]
    private_key: Option<PathBuf>,

    /// Signer PKCS#12 file (.p12)
    #[arg(short = 'p', long)]
    pkcs12: Option<PathBuf>,

    /// Passphrase for the private key or PKCS#12
    #[arg(long, env = "PASSKIT_KEY_PASSPHRASE", hide_env_values = true)]
    passphrase: Option<String>,

    /// JSON file with top-level overrides (serialNumber, description, ...)
    #[arg(long)]
    overrides: Option<PathBuf>,

    /// Translations as LANG=FILE.json, repeatable
    #[arg(short = 'l', long = "localize", value_parser = parse_localization)]
    localizations: Vec<(String, PathBuf)>,

    /// Transit type for boarding passes (e.g. PKTransitTypeAir)
    #[arg(long)]
    transit_type: Option<TransitType>,

    /// Encode MESSAGE as a barcode in every format
    #[arg(long)]
    barcode: Option<String>,

    /// Format shown on devices that support a single barcode
    #[arg(long, requires = "barcode")]
    barcode_format: Option<String>,

    /// Manifest digest (sha1 or sha256)
    #[arg(long, default_value = "sha1")]
    digest: DigestAlgorithm,

    /// ZIP compression level (0-9, default: 6)
    #[arg(short = 'z', long, default_value = "6")]
    zip_level: u32,
}

#[derive(Args)]
struct VerifyArgs {
    /// The .pkpass to check
    input: PathBuf,

    /// Trusted certificates (PEM or DER), typically the WWDR certificate
    #[arg(short = 't', long = "trust", required = true)]
    trust: Vec<PathBuf>,
}

fn parse_localization(value: &str) -> Result<(String, PathBuf), String> {
    match value.split_once('=') {
        Some((lang, path)) if !lang.is_empty() && !path.is_empty() => {
            Ok((lang.to_string(), PathBuf::from(path)))
        }
        _ => Err(format!("expected LANG=FILE, got {value:?}")),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Generate(args) => generate(args),
        Command::Verify(args) => verify(args),
    }
}

fn generate(args: GenerateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut identity = identity_source(&args)?;
    if let Some(passphrase) = args.passphrase {
        identity = identity.passphrase(passphrase);
    }

    let overrides = match args.overrides {
        Some(ref path) => {
            let value: serde_json::Value = serde_json::from_slice(&std::fs::read(path)?)?;
            Some(Overrides::from_json(&value)?)
        }
        None => None,
    };

    let mut pass = create_pass(&args.model, &identity, overrides)?;

    for (lang, path) in &args.localizations {
        let translations: Translations = serde_json::from_slice(&std::fs::read(path)?)?;
        pass.localize(lang, Some(translations));
    }
    if let Some(transit_type) = args.transit_type {
        pass.set_transit_type(transit_type)?;
    }
    if let Some(message) = args.barcode {
        pass.barcodes(Some(Barcodes::Message(message)));
    }
    if let Some(ref format) = args.barcode_format {
        pass.barcode(Some(format.as_str()))?;
    }
    pass.digest_algorithm(args.digest)
        .compression_level(args.zip_level);

    let output = args.output.unwrap_or_else(|| {
        let mut out = args.model.clone();
        out.set_extension("pkpass");
        out
    });
    std::fs::write(&output, pass.generate()?)?;

    println!("Generated: {}", output.display());
    Ok(())
}

fn identity_source(args: &GenerateArgs) -> Result<IdentitySource, Box<dyn std::error::Error>> {
    if let Some(ref p12) = args.pkcs12 {
        return Ok(IdentitySource::pkcs12(&args.wwdr, p12));
    }

    if let (Some(ref cert), Some(ref key)) = (&args.certificate, &args.private_key) {
        return Ok(IdentitySource::new(&args.wwdr, cert, key));
    }

    Err("Must provide either --pkcs12 or both --certificate and --private-key".into())
}

fn verify(args: VerifyArgs) -> Result<(), Box<dyn std::error::Error>> {
    let anchors = args
        .trust
        .iter()
        .map(std::fs::read)
        .collect::<Result<Vec<_>, _>>()?;
    let trust = TrustStore::from_certificates(anchors.iter().map(Vec::as_slice))?;

    let bytes = std::fs::read(&args.input)?;
    let verified = verify_pkpass(&bytes, &trust)?;
    info!(
        files = verified.manifest.len(),
        signers = verified.signers.len(),
        "signature and manifest verified"
    );

    println!(
        "Verified: {} ({} files, {} manifest)",
        args.input.display(),
        verified.contents.files.len(),
        verified.manifest.algorithm()
    );
    Ok(())
}
