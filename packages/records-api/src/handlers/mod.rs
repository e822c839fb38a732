//! HTTP endpoint implementations for the record and playbook resources.

mod playbook_handlers;
mod record_handlers;
pub mod request_utils;
pub mod response;

pub use playbook_handlers::{create_playbook, list_playbooks, read_playbook};
pub use record_handlers::{
    create_record, delete_record, list_records, partial_update_record, read_record,
};
pub use response::{error_response, ErrorResponse, ListResponse};
