mod run;

use crate::sweep::SweepConfig;

/// Action enum representing each possible command
#[derive(Debug)]
pub enum Action {
    Sweep { config: SweepConfig },
}

impl Action {
    /// Execute the action
    ///
    /// # Errors
    ///
    /// Returns an error if the action fails to execute
    pub async fn execute(self) -> anyhow::Result<()> {
        run::execute(self).await
    }
}
