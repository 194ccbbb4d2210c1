use crate::links::SupportContact;
use crate::location::LocationSession;
use crate::region::RegionTable;

pub struct AppState {
    pub session: LocationSession,
    pub regions: RegionTable,
    pub support: SupportContact,
}

impl AppState {
    pub fn new(session: LocationSession) -> Self {
        Self {
            session,
            regions: RegionTable::builtin(),
            support: SupportContact::default(),
        }
    }
}
