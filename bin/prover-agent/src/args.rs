use std::path::PathBuf;

use argh::FromArgs;

#[derive(Debug, Clone, FromArgs)]
#[argh(description = "Tessera prover agent")]
pub(crate) struct Args {
    #[argh(option, short = 'c', description = "path to configuration")]
    pub config: PathBuf,

    /// Overrides the datadir in the config toml.
    #[argh(
        option,
        short = 'd',
        description = "datadir path that will contain the task queue"
    )]
    pub datadir: Option<PathBuf>,
}
