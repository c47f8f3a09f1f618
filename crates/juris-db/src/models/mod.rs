//! Database models for the sync engine.

pub mod case_dataset;
pub mod integration_credential;
pub mod legal_case;
pub mod process_response;
pub mod process_sync;
pub mod sync_audit;
pub mod tenant_plan;

pub use case_dataset::{
    CaseDataset, CaseHeader, DatasetCounts, NormalizedAttachment, NormalizedMovement,
    NormalizedParty, NormalizedSubject,
};
pub use integration_credential::IntegrationCredential;
pub use legal_case::LegalCase;
pub use process_response::{ProcessResponse, ResponseSource};
pub use process_sync::{CreateProcessSync, ProcessSync, SyncRequestType, SyncStatus};
pub use sync_audit::SyncAudit;
pub use tenant_plan::TenantPlan;
