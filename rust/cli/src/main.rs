use dumbvec_cli::dumbvec_cli;

#[tokio::main]
async fn main() {
    let args = std::env::args().collect::<Vec<String>>();
    if let Err(e) = dumbvec_cli(args).await {
        eprintln!("Error: {e}");
        std::process::exit(e.exit_code());
    }
}
