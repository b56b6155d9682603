//! Code Catalog: maps the 6-character table codes embedded in the source
//! spreadsheets to canonical target table names.
//!
//! Only the geographic tables, the INE zones and the structural trio
//! (steps/records/fields) have bespoke storage; every other known code is
//! persisted through the generic catalog strategy under its slug. Codes not
//! listed here map to [`TABLE_UNRECOGNIZED`] and their rows are dropped.

use once_cell::sync::Lazy;
use std::collections::HashMap;

// Message structure
pub const TABLE_PROCESSES: &str = "processes";
pub const TABLE_STEPS: &str = "steps";
pub const TABLE_RECORDS: &str = "records";
pub const TABLE_FIELDS: &str = "fields";
pub const TABLE_HEADER_TYPES: &str = "header_types";
pub const TABLE_RECORD_TYPES: &str = "record_types";

// Geography and agents
pub const TABLE_COUNTRIES: &str = "countries";
pub const TABLE_DISTRICTS: &str = "districts";
pub const TABLE_MUNICIPALITIES: &str = "municipalities";
pub const TABLE_PARISHES: &str = "parishes";
pub const TABLE_INE_ZONES: &str = "ine_zones";

/// Sentinel for header rows whose table code is not in the map. Data rows
/// under it are intentionally dropped, not treated as an error.
pub const TABLE_UNRECOGNIZED: &str = "unrecognized";

static TABLE_CODES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        // Message structure
        ("T00010", TABLE_PROCESSES),
        ("T00020", TABLE_STEPS),
        ("T00040", TABLE_RECORDS),
        ("T00050", TABLE_FIELDS),
        ("T00060", TABLE_HEADER_TYPES),
        ("T00070", TABLE_RECORD_TYPES),
        // Errors
        ("T05010", "syntax_errors"),
        ("T05020", "data_errors"),
        // Geography and agents
        ("T10020", "electrical_units"),
        ("T10051", "cae_rev4"),
        ("T10110", TABLE_COUNTRIES),
        ("T10120", TABLE_DISTRICTS),
        ("T10130", TABLE_MUNICIPALITIES),
        ("T10140", TABLE_PARISHES),
        ("T10150", TABLE_INE_ZONES),
        ("T10210", "postal_codes"),
        ("T10300", "agent_types"),
        ("T10310", "network_operators"),
        ("T10320", "retailers"),
        ("T10380", "logistics_operator"),
        // Delivery point / installation
        ("T12110", "service_quality_zones"),
        ("T12210", "voltage_levels"),
        ("T12215", "delivery_point_types"),
        ("T12217", "installation_chars"),
        ("T12220", "measurement_voltage"),
        ("T12225", "reporting_voltage"),
        ("T12230", "number_of_phases"),
        ("T12510", "contracted_power"),
        ("T12520", "consumption_profile"),
        ("T12610", "delivery_point_contact"),
        // Customer and identification
        ("T13010", "identification_types"),
        ("T13020", "customer_types"),
        ("T13110", "holder_address_types"),
        ("T13210", "cne_identification"),
        ("T13220", "cne_contact"),
        ("T13230", "cne_preferred_contact"),
        ("T13240", "deficiency_equipment"),
        ("T13310", "priority_customer_loc"),
        ("T13320", "mr_contracting_reasons"),
        ("T13330", "rpe_access_purpose"),
        // Metering and equipment
        ("T14050", "equipment_brands"),
        ("T14060", "measurement_device_type"),
        ("T14070", "ownership"),
        ("T14080", "measurement_device_func"),
        ("T14110", "supported_measurement_func"),
        ("T14120", "measurement_variable"),
        ("T14210", "allowed_cycles"),
        ("T14220", "time_cycles"),
        ("T14310", "data_collection_type"),
        ("T14320", "collected_data_type"),
        ("T14410", "time_periods"),
        ("T14420", "recorders"),
        ("T14430", "recorder_type"),
        ("T14510", "movement_type"),
        ("T14620", "reading_reasons"),
        ("T14650", "reading_type"),
        ("T14670", "reading_status"),
        ("T14680", "reading_state"),
        ("T14810", "estimation_methods"),
        // Flow and motivation
        ("T20100", "yes_no_response"),
        ("T20101", "acceptance_response"),
        ("T20102", "holder_change_context"),
        ("T20200", "social_tariff"),
        ("T21151", "cancellation_reason"),
        ("T21510", "termination_reason"),
        ("T23100", "suspension_reactivation"),
        ("T23110", "process_suspension_reasons"),
        ("T23160", "incidence_reasons"),
        ("T23165", "incidence_ordinal"),
        ("T23166", "incidence_responsibility"),
        ("T23190", "anomaly_type_fraud"),
        ("T23196", "ord_info_type"),
        ("T23200", "proof_document_type"),
        ("T23210", "dp_supply_status"),
        ("T23230", "production_type"),
        ("T23250", "subprocess_code"),
        ("T24120", "objection_reasons"),
        ("T24150", "refusal_reasons"),
        ("T25100", "activation_type"),
        ("T25140", "services_to_perform"),
        ("T25150", "communication_type"),
        ("T26100", "access_tariffs"),
        ("T26110", "dp_network_area"),
        ("T29000", "recipient"),
        ("T29100", "deadline_identifiers"),
    ])
});

/// Canonical table name for a source table code, or [`TABLE_UNRECOGNIZED`]
/// when the code is unknown.
pub fn table_for_code(code: &str) -> &'static str {
    TABLE_CODES.get(code).copied().unwrap_or(TABLE_UNRECOGNIZED)
}
