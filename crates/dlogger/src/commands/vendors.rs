use anyhow::Result;
use dlogger_core::Pipeline;

use crate::preview::vendors_table;

pub fn handle_vendors_command(pipeline: &Pipeline) -> Result<()> {
    println!("{}", vendors_table(pipeline.registry().profiles()));
    Ok(())
}
