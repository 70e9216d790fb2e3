const USAGE: &str = "Usage: slurper [--version] [--help] [--config <file>]";

#[tokio::main]
async fn main() {
  let mut config_path: Option<String> = None;
  let mut args = std::env::args().skip(1);
  while let Some(arg) = args.next() {
    match arg.as_str() {
      "--version" | "-V" => {
        println!("slurper {}", env!("CARGO_PKG_VERSION"));
        return;
      }
      "--config" | "-c" => match args.next() {
        Some(path) => config_path = Some(path),
        None => {
          eprintln!("error: --config needs a file path");
          std::process::exit(2);
        }
      },
      "--help" | "-h" => {
        println!("{USAGE}");
        return;
      }
      other => {
        eprintln!("error: unknown argument {other:?}\n{USAGE}");
        std::process::exit(2);
      }
    }
  }

  if let Err(e) = slurper::app::run(config_path.as_deref()).await {
    eprintln!("error: {e}");
    std::process::exit(1);
  }
}
