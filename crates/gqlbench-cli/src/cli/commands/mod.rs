use crate::cli::args::{Cli, Command};

pub mod init;
pub mod run;

pub mod exit_codes {
    pub const OK: i32 = 0;
    pub const CONFIG_ERROR: i32 = 2;
}

/// Which pipeline phases a command runs, on top of the config's own switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phases {
    FromConfig,
    PredictOnly,
    EvaluateOnly,
}

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Run(args) => run::run(args, Phases::FromConfig).await,
        Command::Predict(args) => run::run(args, Phases::PredictOnly).await,
        Command::Evaluate(args) => run::run(args, Phases::EvaluateOnly).await,
        Command::Init(args) => init::run(args),
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(exit_codes::OK)
        }
    }
}
