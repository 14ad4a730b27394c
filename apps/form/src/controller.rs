//! Upload form controller.
//!
//! ```text
//! LoadingConfig ──ok──▶ Ready ──submit──▶ Submitting ──ok──▶ Success
//!       │                 ▲                   │                 │
//!      err                └──────err──────────┘                 │
//!       ▼                 ▲                                     │
//!  ConfigError ──retry──▶ LoadingConfig        Ready ◀─start_over┘
//! ```
//!
//! Every network round-trip is split into a `begin_*` step that hands out a
//! ticket and an `apply_*` step that consumes the result. A result is applied
//! only if its ticket is still the latest one and the controller has not been
//! torn down, so a stale or late response can never overwrite newer state.
//! The `load_config` / `submit` helpers run both halves back to back.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::attachment::{AttachmentError, AttachmentPolicy, NoPreview, PreviewHandle, PreviewHost, SelectedAttachment};
use crate::consent::consent_given;
use crate::gateway::{FormGateway, GatewayError, UploadReceipt};
use crate::messages;
use crate::render::{BindingError, FieldInput, FormBinding, RenderedForm};
use crate::rules::FieldErrors;
use crate::schema::FormSchema;
use crate::settings::FormSettings;
use crate::values::FormValues;

/// Field names whose value is used to greet the candidate after a successful
/// upload, in order of preference.
const SUBMITTER_NAME_FIELDS: &[&str] = &["prenom", "first_name", "full_name", "name", "nom"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuccessState {
    pub receipt: UploadReceipt,
    pub submitter: Option<String>,
}

impl SuccessState {
    pub fn upload_id(&self) -> &str {
        &self.receipt.upload_id
    }

    pub fn title(&self) -> String {
        match &self.submitter {
            Some(name) => messages::SUCCESS_TITLE_WITH_NAME.replace("{name}", name),
            None => messages::SUCCESS_TITLE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    LoadingConfig,
    /// The schema could not be loaded; `retry_config` starts over.
    ConfigError(String),
    Ready,
    Submitting,
    Success(Box<SuccessState>),
}

/// Why a submit attempt never reached the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitBlocked {
    NotReady,
    AlreadySubmitting,
    MissingFile,
    MissingConsent,
    InvalidFields(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigTicket {
    generation: u64,
}

/// The package handed to the gateway: a snapshot of the file and values at
/// the moment submit was accepted.
#[derive(Debug, Clone)]
pub struct SubmissionTicket {
    generation: u64,
    pub attachment: SelectedAttachment,
    pub values: FormValues,
}

struct Selection {
    attachment: SelectedAttachment,
    preview: PreviewHandle,
}

pub struct UploadController<G: FormGateway + ?Sized> {
    gateway: Arc<G>,
    policy: AttachmentPolicy,
    previews: Arc<dyn PreviewHost>,
    phase: Phase,
    form: Option<FormBinding>,
    selection: Option<Selection>,
    banner: Option<String>,
    config_generation: u64,
    submit_generation: u64,
    torn_down: bool,
}

impl<G: FormGateway + ?Sized> UploadController<G> {
    pub fn new(gateway: Arc<G>, settings: &FormSettings) -> Self {
        Self::with_previews(gateway, settings, Arc::new(NoPreview))
    }

    pub fn with_previews(
        gateway: Arc<G>,
        settings: &FormSettings,
        previews: Arc<dyn PreviewHost>,
    ) -> Self {
        Self {
            gateway,
            policy: AttachmentPolicy::new(settings.max_file_bytes),
            previews,
            phase: Phase::LoadingConfig,
            form: None,
            selection: None,
            banner: None,
            config_generation: 0,
            submit_generation: 0,
            torn_down: false,
        }
    }

    // ── accessors ────────────────────────────────────────────────────────

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    /// The form-level error message (file, consent, server), if any.
    pub fn banner(&self) -> Option<&str> {
        self.banner.as_deref()
    }

    pub fn schema(&self) -> Option<&FormSchema> {
        self.form.as_ref().map(FormBinding::schema)
    }

    pub fn values(&self) -> Option<&FormValues> {
        self.form.as_ref().map(FormBinding::values)
    }

    pub fn field_errors(&self) -> Option<&FieldErrors> {
        self.form.as_ref().map(FormBinding::errors)
    }

    pub fn attachment(&self) -> Option<&SelectedAttachment> {
        self.selection.as_ref().map(|s| &s.attachment)
    }

    pub fn preview(&self) -> Option<&str> {
        self.selection.as_ref().map(|s| s.preview.as_str())
    }

    pub fn render(&self) -> Option<RenderedForm> {
        self.form.as_ref().map(FormBinding::render)
    }

    pub fn is_submitting(&self) -> bool {
        self.phase == Phase::Submitting
    }

    /// Whether the submit control is enabled.
    pub fn can_submit(&self) -> bool {
        self.phase == Phase::Ready && !self.torn_down
    }

    pub fn success(&self) -> Option<&SuccessState> {
        match &self.phase {
            Phase::Success(state) => Some(state),
            _ => None,
        }
    }

    // ── configuration ────────────────────────────────────────────────────

    pub fn begin_config_load(&mut self) -> ConfigTicket {
        self.config_generation += 1;
        self.phase = Phase::LoadingConfig;
        self.banner = None;
        ConfigTicket {
            generation: self.config_generation,
        }
    }

    /// Applies a schema fetch result. Returns false when the result was
    /// discarded as stale or arrived after teardown.
    pub fn apply_config(
        &mut self,
        ticket: ConfigTicket,
        result: Result<FormSchema, GatewayError>,
    ) -> bool {
        if self.torn_down || ticket.generation != self.config_generation {
            debug!(generation = ticket.generation, "discarding stale form configuration");
            return false;
        }

        let binding = result
            .map_err(|e| e.to_string())
            .and_then(|schema| FormBinding::new(schema).map_err(|e| e.to_string()));

        match binding {
            Ok(binding) => {
                info!(
                    version = %binding.schema().version,
                    fields = binding.schema().fields.len(),
                    "form configuration loaded"
                );
                // A new schema replaces the form wholesale.
                self.form = Some(binding);
                self.phase = Phase::Ready;
            }
            Err(reason) => {
                warn!(%reason, "failed to load form configuration");
                self.form = None;
                self.phase = Phase::ConfigError(messages::CONFIG_LOAD_FAILED.to_string());
            }
        }
        true
    }

    pub async fn load_config(&mut self) {
        let ticket = self.begin_config_load();
        let result = self.gateway.fetch_schema().await;
        self.apply_config(ticket, result);
    }

    /// Explicit retry after a configuration failure. No-op in other phases.
    pub async fn retry_config(&mut self) {
        if matches!(self.phase, Phase::ConfigError(_)) {
            self.load_config().await;
        }
    }

    // ── user input ───────────────────────────────────────────────────────

    /// Offers a file. A rejected file leaves any previous selection in place.
    pub fn select_file(&mut self, candidate: SelectedAttachment) -> Result<(), AttachmentError> {
        if self.phase != Phase::Ready || self.torn_down {
            return Err(AttachmentError::NotAccepting);
        }
        if let Err(e) = self.policy.check(&candidate) {
            debug!(file = %candidate.file_name, error = %e, "file rejected");
            self.banner = Some(e.user_message());
            return Err(e);
        }

        let preview = PreviewHandle::open(self.previews.clone(), &candidate);
        // Dropping the old selection revokes its preview.
        self.selection = Some(Selection {
            attachment: candidate,
            preview,
        });
        self.banner = None;
        Ok(())
    }

    pub fn clear_file(&mut self) {
        self.selection = None;
    }

    pub fn change_field(&mut self, name: &str, input: FieldInput) -> Result<(), BindingError> {
        self.form_mut(name)?.change(name, input)
    }

    pub fn blur_field(&mut self, name: &str) -> Result<(), BindingError> {
        self.form_mut(name)?.blur(name)
    }

    fn form_mut(&mut self, name: &str) -> Result<&mut FormBinding, BindingError> {
        self.form
            .as_mut()
            .ok_or_else(|| BindingError::UnknownField(name.to_string()))
    }

    // ── submission ───────────────────────────────────────────────────────

    /// Runs every client-side gate. On success the controller enters
    /// `Submitting` and returns the package to send.
    pub fn begin_submit(&mut self) -> Result<SubmissionTicket, SubmitBlocked> {
        match self.phase {
            Phase::Submitting => return Err(SubmitBlocked::AlreadySubmitting),
            Phase::Ready if !self.torn_down => {}
            _ => return Err(SubmitBlocked::NotReady),
        }
        let Some(form) = self.form.as_mut() else {
            return Err(SubmitBlocked::NotReady);
        };

        let fields_valid = form.validate_all();

        let Some(selection) = &self.selection else {
            self.banner = Some(messages::FILE_MISSING.to_string());
            return Err(SubmitBlocked::MissingFile);
        };

        if !consent_given(form.schema(), form.values()) {
            self.banner = Some(messages::CONSENT_MISSING.to_string());
            return Err(SubmitBlocked::MissingConsent);
        }

        if !fields_valid {
            self.banner = None;
            return Err(SubmitBlocked::InvalidFields(form.errors().len()));
        }

        self.banner = None;
        self.submit_generation += 1;
        self.phase = Phase::Submitting;
        Ok(SubmissionTicket {
            generation: self.submit_generation,
            attachment: selection.attachment.clone(),
            values: form.values().clone(),
        })
    }

    /// Applies the gateway's answer. Returns false when the result was
    /// discarded.
    pub fn apply_submission(
        &mut self,
        ticket: SubmissionTicket,
        result: Result<UploadReceipt, GatewayError>,
    ) -> bool {
        if self.torn_down
            || ticket.generation != self.submit_generation
            || self.phase != Phase::Submitting
        {
            debug!(generation = ticket.generation, "discarding stale submission result");
            return false;
        }

        match result {
            Ok(receipt) => {
                info!(upload_id = %receipt.upload_id, "CV uploaded");
                let submitter = submitter_name(&ticket.values);
                if let Some(form) = self.form.as_mut() {
                    form.reset();
                }
                self.selection = None;
                self.banner = None;
                self.phase = Phase::Success(Box::new(SuccessState { receipt, submitter }));
            }
            Err(e) => {
                warn!(error = %e, "CV upload failed");
                if let Some(form) = self.form.as_mut() {
                    for issue in e.field_issues() {
                        form.set_error(&issue.field, issue.message.clone());
                    }
                }
                self.banner = Some(e.user_message());
                self.phase = Phase::Ready;
            }
        }
        true
    }

    pub async fn submit(&mut self) -> Result<(), SubmitBlocked> {
        let ticket = self.begin_submit()?;
        let result = self
            .gateway
            .submit(&ticket.attachment, &ticket.values)
            .await;
        self.apply_submission(ticket, result);
        Ok(())
    }

    /// Leaves the success screen ("Nouvelle candidature" / dismiss) and
    /// returns to an empty form, identical to a fresh mount.
    pub fn start_over(&mut self) {
        if !matches!(self.phase, Phase::Success(_)) {
            return;
        }
        if let Some(form) = self.form.as_mut() {
            form.reset();
        }
        self.selection = None;
        self.banner = None;
        self.phase = Phase::Ready;
    }

    /// Releases everything the controller holds. Results of requests still in
    /// flight are ignored from now on.
    pub fn teardown(&mut self) {
        self.torn_down = true;
        self.selection = None;
    }
}

fn submitter_name(values: &FormValues) -> Option<String> {
    SUBMITTER_NAME_FIELDS
        .iter()
        .filter_map(|name| values.text(name))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}
