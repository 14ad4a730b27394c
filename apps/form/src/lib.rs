//! Server-driven CV upload form.
//!
//! The backend describes the form as a [`FormSchema`]; this crate compiles the
//! schema into validation checks, renders it into a control model bound to
//! [`FormValues`], and drives the upload through an [`UploadController`] that
//! talks to the backend via a [`FormGateway`].
//!
//! Nothing here touches a real UI toolkit: the controller is an event-driven
//! state machine, and the presentation layer reads its state and forwards user
//! events to it.

pub mod attachment;
pub mod consent;
pub mod controller;
pub mod gateway;
pub mod messages;
pub mod render;
pub mod rules;
pub mod schema;
pub mod settings;
pub mod stats;
pub mod values;

pub use attachment::{AttachmentError, AttachmentPolicy, PreviewHandle, PreviewHost, SelectedAttachment};
pub use controller::{Phase, SubmitBlocked, SuccessState, UploadController};
pub use gateway::{FieldIssue, FileInfo, FormGateway, GatewayError, HttpGateway, UploadReceipt, UploadStats};
pub use render::{render_form, FieldInput, FormBinding, RenderedForm};
pub use rules::{CompiledField, CompiledSchema, FieldErrors};
pub use schema::{FieldDescriptor, FieldKind, FormSchema, SchemaError, ValidationRule};
pub use settings::FormSettings;
pub use stats::{ShellState, StatsPanel};
pub use values::{FieldValue, FormValues};
