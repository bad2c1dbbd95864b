/// Default buffer size used for every `BufReader`/`BufWriter` the crate opens.
pub const BUFFERSIZE: usize = 64 * 1024;

/// Build-time metadata, generated by `build.rs` via the `built` crate.
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));

    use lazy_static::lazy_static;

    lazy_static! {
        /// The crate version, with the git short hash appended when available.
        pub static ref VERSION: String = get_software_version();
    }

    fn get_software_version() -> String {
        let git_commit = GIT_VERSION.map(|v| format!("-{}", v)).unwrap_or_default();
        format!("{}{}", PKG_VERSION, git_commit)
    }
}
