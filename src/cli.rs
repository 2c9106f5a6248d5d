use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)] // Read from `Cargo.toml`
pub struct Cli {
    /// Service command to launch and supervise. The first element is the
    /// amazon-ssm-agent binary, which is also invoked for registration.
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

impl Cli {
    pub fn command(&self) -> &[String] {
        &self.command
    }
}
