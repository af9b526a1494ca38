use anyhow::{Result, bail};

use healthdump_core::input::{int_from_str, real_from_str, weight_from_str};
use healthdump_core::models::{HealthRecordUpdate, Patch};
use healthdump_core::service::HealthService;

use super::dump::print_outcome;
use super::helpers::{parse_date, print_json};

pub(crate) struct EditArgs {
    pub steps: Option<String>,
    pub kcals: Option<String>,
    pub km: Option<String>,
    pub flights: Option<String>,
    pub clear_flights: bool,
    pub weight: Option<String>,
    pub clear_weight: bool,
}

impl EditArgs {
    fn into_update(self) -> Result<HealthRecordUpdate> {
        let flights_climbed = match (self.flights, self.clear_flights) {
            (_, true) => Patch::Clear,
            (Some(f), false) => Patch::Set(int_from_str("flights_climbed", &f)?),
            (None, false) => Patch::Unchanged,
        };
        let weight = match (self.weight, self.clear_weight) {
            (_, true) => Patch::Clear,
            (Some(w), false) => match weight_from_str(&w)? {
                Some(w) => Patch::Set(w),
                None => Patch::Clear,
            },
            (None, false) => Patch::Unchanged,
        };

        Ok(HealthRecordUpdate {
            steps: self
                .steps
                .map_or(Ok(Patch::Unchanged), |s| int_from_str("steps", &s).map(Patch::Set))?,
            kcals: self
                .kcals
                .map_or(Ok(Patch::Unchanged), |s| real_from_str("kcals", &s).map(Patch::Set))?,
            km: self
                .km
                .map_or(Ok(Patch::Unchanged), |s| real_from_str("km", &s).map(Patch::Set))?,
            flights_climbed,
            weight,
        })
    }
}

pub(crate) fn cmd_edit(svc: &HealthService, date: &str, args: EditArgs, json: bool) -> Result<()> {
    let date = parse_date(Some(date))?;
    let update = args.into_update()?;
    if update.is_empty() {
        bail!("Nothing to update. Pass at least one of --steps, --kcals, --km, --flights, --weight");
    }

    let outcome = svc.edit(date, &update)?;
    if json {
        return print_json(&outcome);
    }
    print_outcome(&outcome);
    Ok(())
}
