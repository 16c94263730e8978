use clap::Parser;
use folderbak::commands::backup::{self, args::Args};
use folderbak::config::Config;

/// Numbered folder backups (`name_1`, `name_2`, ...).
fn main() {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    // 設定ファイルを読み込む
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("fb: {e}");
            std::process::exit(1);
        }
    };

    let exit_code = backup::run(args, config);
    std::process::exit(exit_code);
}
