use std::path::PathBuf;

/// Build-time configuration consumed through `option_env!` in `src/config.rs`.
const CONFIG_VARS: &[&str] = &[
    "PLANTNODE_WIFI_SSID",
    "PLANTNODE_WIFI_PASS",
    "PLANTNODE_BROKER_URL",
    "PLANTNODE_BROKER_USER",
    "PLANTNODE_BROKER_PASS",
    "PLANTNODE_TOPIC",
    "PLANTNODE_SAMPLE_INTERVAL_MS",
    "PLANTNODE_READY_TIMEOUT_SECS",
];

fn main() {
    for var in CONFIG_VARS {
        println!("cargo:rerun-if-env-changed={var}");
    }

    embed_trust_anchor();

    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("espidf") {
        embuild::espidf::sysenv::output();
    }
}

/// Copy the collector's root certificate into `OUT_DIR/trust_anchor.pem`,
/// NUL-terminated as mbedTLS expects. An absent certificate produces an
/// empty file; the firmware rejects it at startup.
fn embed_trust_anchor() {
    println!("cargo:rerun-if-env-changed=PLANTNODE_TRUST_ANCHOR");

    let out_dir = PathBuf::from(std::env::var("OUT_DIR").expect("cargo sets OUT_DIR"));
    let target = out_dir.join("trust_anchor.pem");

    let mut pem = match std::env::var("PLANTNODE_TRUST_ANCHOR") {
        Ok(path) => {
            println!("cargo:rerun-if-changed={path}");
            match std::fs::read(&path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    println!("cargo:warning=cannot read trust anchor '{path}': {e}");
                    Vec::new()
                }
            }
        }
        Err(_) => {
            println!("cargo:warning=PLANTNODE_TRUST_ANCHOR not set; firmware will refuse to start the session");
            Vec::new()
        }
    };

    if !pem.is_empty() && pem.last() != Some(&0) {
        pem.push(0);
    }

    std::fs::write(&target, &pem).expect("write trust anchor into OUT_DIR");
}
