pub mod classification_service;
pub mod correction_service;
pub mod extraction_service;
pub mod file_service;
pub mod ocr_service;
pub mod pipeline_service;
pub mod record_service;
pub mod rename_service;
pub mod report_service;
pub mod rollback_service;
pub mod watch_service;
