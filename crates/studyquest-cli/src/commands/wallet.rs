use studyquest_core::Database;

use super::{print_json, CliResult};

pub fn run() -> CliResult {
    let db = Database::open()?;
    print_json(&db.load_ledger()?)
}
