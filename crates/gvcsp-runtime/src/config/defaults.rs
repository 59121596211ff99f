//! Compile-time defaults, merged by build.rs from the library values and
//! an optional `GVCSP_CONFIG_RS` override file.

include!(concat!(env!("OUT_DIR"), "/gvcsp_merged_config.rs"));
