use project_graph::cli::parse;

fn main() {
    let cli = parse();

    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Error);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let code = project_graph::app::run_cli(cli);
    if code != 0 {
        std::process::exit(code);
    }
}
