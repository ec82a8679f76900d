fn main() {
    use clap::Parser;
    use std::error::Error;
    let args = fqmerge::cli::Args::parse();
    if let Err(e) = fqmerge::logging::init(fqmerge::logging::level_for(args.quiet, args.verbose)) {
        eprintln!("Warning: could not initialize logging: {}", e);
    }
    if let Err(e) = fqmerge::cli::run(&args) {
        eprintln!("{}", e);
        if args.verbose {
            let mut source = e.source();
            while let Some(s) = source {
                eprintln!("  cause: {}", s);
                source = s.source();
            }
        }
        std::process::exit(e.exit_code());
    }
}
