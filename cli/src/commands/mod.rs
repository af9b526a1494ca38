mod dump;
mod edit;
mod goals;
mod helpers;
mod import;
mod show;
mod summary;

pub(crate) use dump::{DumpArgs, cmd_dump};
pub(crate) use edit::{EditArgs, cmd_edit};
pub(crate) use goals::cmd_goals;
pub(crate) use import::{cmd_export, cmd_import};
pub(crate) use show::{cmd_history, cmd_show};
pub(crate) use summary::cmd_summary;
