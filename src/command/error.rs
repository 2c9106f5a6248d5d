use thiserror::Error;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("spawn process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("signal delivery: `{0}`")]
    NixError(String),
}
