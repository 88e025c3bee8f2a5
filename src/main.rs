fn main() {
    #[cfg(feature = "cli")]
    modpatch::cli::run();

    #[cfg(not(feature = "cli"))]
    {
        eprintln!("modpatch: CLI not enabled. Rebuild with `--features cli`.");
        std::process::exit(1);
    }
}
