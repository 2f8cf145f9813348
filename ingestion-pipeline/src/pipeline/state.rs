use state_machines::state_machine;

state_machine! {
    name: IngestionMachine,
    state: IngestionState,
    initial: Received,
    states: [Received, PathAssigned, Unique, Extracted, Validated, Classified, Assembled, Persisted],
    events {
        assign_path { transition: { from: Received, to: PathAssigned } }
        confirm_unique { transition: { from: PathAssigned, to: Unique } }
        extract { transition: { from: Unique, to: Extracted } }
        validate { transition: { from: Extracted, to: Validated } }
        classify { transition: { from: Validated, to: Classified } }
        assemble { transition: { from: Classified, to: Assembled } }
        persist { transition: { from: Assembled, to: Persisted } }
    }
}

pub fn received() -> IngestionMachine<(), Received> {
    IngestionMachine::new(())
}
