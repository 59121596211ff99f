//! Build script for gvcsp-runtime
//!
//! Produces `OUT_DIR/gvcsp_merged_config.rs`, the compile-time defaults
//! behind `config::defaults`:
//! 1. library defaults from `PARAMS`
//! 2. overridden by any `pub const NAME: TYPE = VALUE;` line found in the
//!    file named by `GVCSP_CONFIG_RS`
//!
//! Only known names are accepted; a user file lists just the values it changes.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;

const CONFIG_ENV: &str = "GVCSP_CONFIG_RS";

struct Param {
    name: &'static str,
    ty: &'static str,
    default: &'static str,
}

const PARAMS: &[Param] = &[
    // 0 = one worker per available CPU
    Param { name: "NUM_WORKERS", ty: "usize", default: "0" },
    Param { name: "STACK_SIZE", ty: "usize", default: "256 * 1024" },
    Param { name: "MAX_TASKS", ty: "usize", default: "65_536" },
    Param { name: "WORK_STEALING", ty: "bool", default: "true" },
    Param { name: "PIN_WORKERS", ty: "bool", default: "true" },
    Param { name: "IDLE_SPINS", ty: "u32", default: "32" },
    Param { name: "PARK_TIMEOUT_MS", ty: "u64", default: "50" },
];

fn main() {
    let out_dir = env::var("OUT_DIR").expect("OUT_DIR not set");
    let dest = Path::new(&out_dir).join("gvcsp_merged_config.rs");

    let mut values: BTreeMap<&'static str, String> =
        PARAMS.iter().map(|p| (p.name, p.default.to_string())).collect();

    println!("cargo:rerun-if-env-changed={}", CONFIG_ENV);
    let user = env::var(CONFIG_ENV).ok();
    if let Some(path) = &user {
        println!("cargo:rerun-if-changed={}", path);
        match fs::read_to_string(path) {
            Ok(src) => {
                for unknown in merge_overrides(&src, &mut values) {
                    println!("cargo:warning=unknown gvcsp config parameter: {}", unknown);
                }
                println!("cargo:warning=using gvcsp config overrides from {}", path);
            }
            Err(e) => println!("cargo:warning=cannot read {} ({}): {}", CONFIG_ENV, path, e),
        }
    }

    fs::write(&dest, render(&values, user.as_deref())).expect("failed to write merged config");
}

/// Apply `pub const` overrides from `src`; returns names not in `PARAMS`.
fn merge_overrides(src: &str, values: &mut BTreeMap<&'static str, String>) -> Vec<String> {
    let mut unknown = Vec::new();
    for (name, value) in src.lines().filter_map(parse_const) {
        match PARAMS.iter().find(|p| p.name == name) {
            Some(p) => {
                values.insert(p.name, value);
            }
            None => unknown.push(name),
        }
    }
    unknown
}

/// `pub const NAME: TYPE = VALUE;` -> `(NAME, VALUE)`
fn parse_const(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.starts_with("//") {
        return None;
    }
    let rest = line.strip_prefix("pub const ")?;
    let (name, rest) = rest.split_once(':')?;
    let (_, value) = rest.split_once('=')?;
    let value = value.trim().trim_end_matches(';').trim();
    if value.is_empty() {
        return None;
    }
    Some((name.trim().to_string(), value.to_string()))
}

fn render(values: &BTreeMap<&'static str, String>, user: Option<&str>) -> String {
    let mut out = String::from("// Generated by gvcsp-runtime/build.rs\n");
    match user {
        Some(path) => out.push_str(&format!("// library defaults merged with {}\n\n", path)),
        None => out.push_str("// library defaults\n\n"),
    }
    for p in PARAMS {
        out.push_str(&format!("pub const {}: {} = {};\n", p.name, p.ty, values[p.name]));
    }
    out
}
