//! DID and credential documents written after a run.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::workflow::WorkflowOutput;

pub const ISSUER_ID_FILE: &str = "issuerID.json";
pub const ISSUER_CREDENTIAL_FILE: &str = "issuerCredential.json";
pub const RECEIVER_ID_FILE: &str = "receiverID.json";
pub const RECEIVER_CREDENTIAL_FILE: &str = "receiverCredential.json";
pub const CREDENTIAL_FILE: &str = "credential.json";

fn write_json<T: Serialize>(dir: &Path, name: &str, value: &T) -> anyhow::Result<PathBuf> {
    let path = dir.join(name);
    std::fs::write(&path, serde_json::to_string_pretty(value)?)?;
    Ok(path)
}

/// Write the five workflow documents into `dir`, creating it if needed.
pub fn write_outputs(dir: &Path, out: &WorkflowOutput) -> anyhow::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let written = vec![
        write_json(dir, ISSUER_ID_FILE, &out.issuer.did)?,
        write_json(dir, ISSUER_CREDENTIAL_FILE, &out.issuer.credential)?,
        write_json(dir, RECEIVER_ID_FILE, &out.receiver.did)?,
        write_json(dir, RECEIVER_CREDENTIAL_FILE, &out.receiver.credential)?,
        write_json(dir, CREDENTIAL_FILE, &out.credential)?,
    ];
    for path in &written {
        tracing::debug!(path = %path.display(), "wrote output");
    }
    Ok(written)
}

/// Human-readable run summary.
pub fn print_summary(out: &WorkflowOutput) {
    println!("Issuer:     {}", out.issuer.did);
    println!("Receiver:   {}", out.receiver.did);
    println!("Credential: {}", out.credential.id);
    println!(
        "  Type:     {}",
        out.credential.primary_type().unwrap_or("-")
    );
    println!(
        "  Status:   {} ({})",
        out.credential.credential_status.status_type, out.credential.credential_status.id
    );
    if let Some(exp) = out.credential.expiration_date {
        println!("  Expires:  {}", exp.to_rfc3339());
    }
    match &out.verification {
        Some(v) if v.valid => println!("  Verified: valid"),
        Some(v) => println!(
            "  Verified: invalid ({})",
            v.reason.map(|r| r.to_string()).unwrap_or_default()
        ),
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChainBackend, SigilConfig};
    use crate::workflow::{run_with, Context};
    use sigil_credentials::StaticSchemaLoader;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_write_outputs() {
        let schema = "https://schemas.example.com/kyc.json";
        let mut config = SigilConfig::default();
        config.chain.backend = ChainBackend::Memory;
        config.credential.schema = schema.into();

        let loader = StaticSchemaLoader::new();
        loader.insert(schema, serde_json::json!({"type": "object"}));
        let ctx = Context::build(&config, Arc::new(loader)).unwrap();
        let out = run_with(&config, &ctx).await.unwrap();

        let dir = std::env::temp_dir().join(format!(
            "sigil-output-{}-{}",
            std::process::id(),
            out.credential.credential_status.revocation_nonce
        ));
        let written = write_outputs(&dir, &out).unwrap();
        assert_eq!(written.len(), 5);

        let did: String =
            serde_json::from_str(&std::fs::read_to_string(dir.join(RECEIVER_ID_FILE)).unwrap())
                .unwrap();
        assert_eq!(did, out.receiver.did.to_string());
        let credential: sigil_core::W3CCredential =
            serde_json::from_str(&std::fs::read_to_string(dir.join(CREDENTIAL_FILE)).unwrap())
                .unwrap();
        assert_eq!(credential, out.credential);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
