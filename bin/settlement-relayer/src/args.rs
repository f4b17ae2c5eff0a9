use std::path::PathBuf;

use argh::FromArgs;

#[derive(Debug, Clone, FromArgs)]
#[argh(description = "Tessera settlement relayer")]
pub(crate) struct Args {
    #[argh(option, short = 'c', description = "path to configuration")]
    pub config: PathBuf,

    /// Overrides the datadir in the config toml.
    #[argh(
        option,
        short = 'd',
        description = "datadir path that will contain the batch database"
    )]
    pub datadir: Option<PathBuf>,
}
