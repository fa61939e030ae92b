#[derive(Debug, Default)]
struct CliArgs {
    endpoint: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let args = parse_args(std::env::args().skip(1).collect())?;

    wavedeck::app::run(wavedeck::app::StartupOptions {
        endpoint: args.endpoint,
    })
}

fn parse_args(args: Vec<String>) -> anyhow::Result<CliArgs> {
    let mut out = CliArgs::default();
    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--endpoint" => {
                index += 1;
                let Some(value) = args.get(index) else {
                    anyhow::bail!("--endpoint requires a base URL");
                };
                if value.trim().is_empty() {
                    anyhow::bail!("--endpoint cannot be empty");
                }
                out.endpoint = Some(value.trim().to_string());
            }
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            other => anyhow::bail!("unknown argument {other}"),
        }
        index += 1;
    }
    Ok(out)
}

fn print_help() {
    println!("wavedeck");
    println!("  --endpoint <url>  Catalog discovery endpoint base URL");
}
