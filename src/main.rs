use colored::Colorize;

fn main() {
    match gatewright::run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{} {}", "error:".bright_red().bold(), e);
            std::process::exit(e.exit_code());
        }
    }
}
