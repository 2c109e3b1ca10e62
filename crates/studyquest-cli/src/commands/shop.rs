use clap::Subcommand;
use studyquest_core::{Config, Database, Event};

use super::{print_json, App, CliResult};

#[derive(Subcommand)]
pub enum ShopAction {
    /// List purchasable boosters
    List,
    /// Buy a booster with coins
    Buy {
        /// Catalog item name
        name: String,
    },
}

pub fn run(action: ShopAction) -> CliResult {
    match action {
        ShopAction::List => {
            let catalog = Config::load()?.catalog()?;
            print_json(catalog.items())?;
        }
        ShopAction::Buy { name } => {
            let mut app = App::open()?;
            // Credit any session that finished since the last invocation.
            let mut events = app.service.activate();
            let purchased = app.service.purchase(&name)?;
            if let Event::BoosterPurchased { effect, .. } = &purchased {
                Database::open()?.update_effects(|effects| effects.push(effect.clone()))?;
            }
            events.push(purchased);
            print_json(&events)?;
        }
    }
    Ok(())
}
