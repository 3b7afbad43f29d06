fn main() {
    #[cfg(feature = "cli")]
    sisopen::cli::run();

    #[cfg(not(feature = "cli"))]
    {
        eprintln!("sisopen: CLI not enabled. Rebuild with `--features cli`.");
        std::process::exit(1);
    }
}
