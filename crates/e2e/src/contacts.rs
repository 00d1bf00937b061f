//! Contact records and the contacts widget workflows
//!
//! Every mutation is a short sequence (navigate, trigger, fill or confirm,
//! verify) and each step waits on a visible success signal before the next
//! one starts.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{SettleDelays, Timeouts};
use crate::error::{E2eError, E2eResult};
use crate::locator::Locator;
use crate::navigator::MenuNavigator;
use crate::surface::{scroll_best_effort, visible_or_false, LoadState, Surface, WaitState};
use crate::topology::NavigationTarget;
use crate::viewport::LayoutRegime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum JobRole {
    Technical,
    Billing,
    Abuse,
    Emergency,
}

impl JobRole {
    pub const ALL: [JobRole; 4] = [
        JobRole::Technical,
        JobRole::Billing,
        JobRole::Abuse,
        JobRole::Emergency,
    ];

    /// Checkbox label on the form
    pub fn label(&self) -> &'static str {
        match self {
            JobRole::Technical => "Technical",
            JobRole::Billing => "Billing",
            JobRole::Abuse => "Abuse",
            JobRole::Emergency => "Emergency",
        }
    }
}

/// Form fields, by their `name` attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactField {
    FirstName,
    MiddleName,
    LastName,
    Nickname,
    Comments,
    Company,
    JobTitle,
    JobRole,
    PhoneNumber,
    Email,
    SecondaryEmail,
}

impl ContactField {
    pub fn input_name(&self) -> &'static str {
        match self {
            ContactField::FirstName => "first_name",
            ContactField::MiddleName => "middle_name",
            ContactField::LastName => "last_name",
            ContactField::Nickname => "nickname",
            ContactField::Comments => "comments",
            ContactField::Company => "company",
            ContactField::JobTitle => "job_title",
            ContactField::JobRole => "job_role",
            ContactField::PhoneNumber => "phone_number",
            ContactField::Email => "email",
            ContactField::SecondaryEmail => "secondary_email",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub middle_name: Option<String>,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub job_role: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub secondary_email: Option<String>,
    #[serde(default)]
    pub job_roles: BTreeSet<JobRole>,
}

impl ContactRecord {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            ..Default::default()
        }
    }

    /// A record whose first name is unique enough to search for.
    ///
    /// Search only matches single name tokens, so the uniqueness lives in
    /// the first name.
    pub fn unique(prefix: &str) -> Self {
        let stamp = chrono::Utc::now().format("%m%d%H%M%S%3f");
        Self::new(format!("{}{}", prefix, stamp), "Contact")
    }

    /// Display key in the contacts table. Not unique on the backend.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Fields to type: the two required names plus every supplied optional.
    pub fn form_values(&self) -> Vec<(ContactField, &str)> {
        let mut values = vec![
            (ContactField::FirstName, self.first_name.as_str()),
            (ContactField::LastName, self.last_name.as_str()),
        ];
        let optional = [
            (ContactField::MiddleName, &self.middle_name),
            (ContactField::Nickname, &self.nickname),
            (ContactField::Comments, &self.comments),
            (ContactField::Company, &self.company),
            (ContactField::JobTitle, &self.job_title),
            (ContactField::JobRole, &self.job_role),
            (ContactField::PhoneNumber, &self.phone_number),
            (ContactField::Email, &self.email),
            (ContactField::SecondaryEmail, &self.secondary_email),
        ];
        values.extend(
            optional
                .into_iter()
                .filter_map(|(field, value)| value.as_deref().map(|v| (field, v))),
        );
        values
    }
}

/// Contacts widget markup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactSelectors {
    pub form: String,
    pub add_label: String,
    /// Submit button labels; create and edit mode label it differently
    pub submit_labels: Vec<String>,
    /// Heading shown once a record was saved and its detail view opened
    pub detail_heading: String,
    pub edit_label: String,
    pub search_input: String,
    pub empty_state: String,
    pub row: String,
    pub delete_control: String,
    pub dialog: String,
    pub confirm_label: String,
}

impl Default for ContactSelectors {
    fn default() -> Self {
        Self {
            form: "form.contact-form".to_string(),
            add_label: "Add contact".to_string(),
            submit_labels: vec!["Create contact".to_string(), "Save changes".to_string()],
            detail_heading: "Contact details".to_string(),
            edit_label: "Edit".to_string(),
            search_input: "input[type=\"search\"]".to_string(),
            empty_state: "No contacts found".to_string(),
            row: "table tbody tr".to_string(),
            delete_control: "[data-action=\"delete\"]".to_string(),
            dialog: "dialog[open]".to_string(),
            confirm_label: "Delete".to_string(),
        }
    }
}

impl ContactSelectors {
    pub fn field(&self, field: ContactField) -> Locator {
        Locator::css(format!("{} [name=\"{}\"]", self.form, field.input_name())).first()
    }

    pub fn role_checkbox(&self, role: JobRole) -> Locator {
        Locator::label(role.label(), true).first()
    }

    pub fn add_button(&self) -> Locator {
        Locator::role("button", &self.add_label, true).first()
    }

    pub fn submit_button(&self, label: &str) -> Locator {
        Locator::role("button", label, true).first()
    }

    pub fn detail_heading(&self) -> Locator {
        Locator::role("heading", &self.detail_heading, true).first()
    }

    pub fn edit_button(&self) -> Locator {
        Locator::text(&self.edit_label, true).first()
    }

    pub fn search_input(&self) -> Locator {
        Locator::css(&self.search_input).first()
    }

    pub fn result_link(&self, full_name: &str) -> Locator {
        Locator::role("link", full_name, true).first()
    }

    pub fn empty_state(&self) -> Locator {
        Locator::text(&self.empty_state, true).first()
    }

    pub fn row(&self, full_name: &str) -> Locator {
        Locator::css(&self.row).has_text(full_name).first()
    }

    pub fn delete_control(&self, full_name: &str) -> Locator {
        self.row(full_name).child(&Locator::css(&self.delete_control)).first()
    }

    pub fn dialog(&self) -> Locator {
        Locator::css(&self.dialog).first()
    }

    pub fn confirm_button(&self) -> Locator {
        Locator::role("button", &self.confirm_label, true)
            .within(&self.dialog())
            .first()
    }
}

/// Where the widget lives and which projects exercise it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactSettings {
    pub enabled: bool,
    pub projects: Vec<LayoutRegime>,
    pub widget: NavigationTarget,
    /// Prefix of generated first names
    pub name_prefix: String,
    pub selectors: ContactSelectors,
}

impl Default for ContactSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            projects: vec![LayoutRegime::Expanded],
            widget: NavigationTarget::entry(&["Account", "Profile"]).with_sub_entry(&["Contacts"]),
            name_prefix: "Etoe".to_string(),
            selectors: ContactSelectors::default(),
        }
    }
}

/// Drives the contacts widget on one surface
pub struct ContactsWidget<'a> {
    surface: &'a dyn Surface,
    selectors: &'a ContactSelectors,
    timeouts: &'a Timeouts,
    settle: &'a SettleDelays,
}

impl<'a> ContactsWidget<'a> {
    pub fn new(
        surface: &'a dyn Surface,
        selectors: &'a ContactSelectors,
        timeouts: &'a Timeouts,
        settle: &'a SettleDelays,
    ) -> Self {
        Self {
            surface,
            selectors,
            timeouts,
            settle,
        }
    }

    /// Wait for a success signal, reporting a timeout as a failed assertion.
    async fn expect(&self, locator: &Locator, state: WaitState, what: &str) -> E2eResult<()> {
        self.surface
            .wait_for(locator, state, self.timeouts.assertion())
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    E2eError::AssertionFailed(format!("{} ({})", what, locator))
                } else {
                    e
                }
            })
    }

    pub async fn create(&self, record: &ContactRecord) -> E2eResult<()> {
        info!("Creating contact {}", record.full_name());
        self.surface
            .click(&self.selectors.add_button(), self.timeouts.action())
            .await?;
        self.fill_form(record, false).await?;
        self.submit().await?;
        self.expect(
            &self.selectors.detail_heading(),
            WaitState::Visible,
            "contact detail view after create",
        )
        .await
    }

    /// Type the record into the form and tick its roles. With `clear_roles`
    /// the roles the record lacks are unticked too, since an edit form
    /// starts out with the stored ones.
    async fn fill_form(&self, record: &ContactRecord, clear_roles: bool) -> E2eResult<()> {
        let action = self.timeouts.action();
        for (field, value) in record.form_values() {
            debug!("Filling {}", field.input_name());
            self.surface
                .fill(&self.selectors.field(field), value, action)
                .await?;
        }
        for role in JobRole::ALL {
            let checkbox = self.selectors.role_checkbox(role);
            if record.job_roles.contains(&role) {
                self.surface.check(&checkbox, action).await?;
            } else if clear_roles {
                self.surface.uncheck(&checkbox, action).await?;
            }
        }
        Ok(())
    }

    /// Click whichever submit button the current mode shows.
    async fn submit(&self) -> E2eResult<()> {
        for label in &self.selectors.submit_labels {
            let button = self.selectors.submit_button(label);
            if visible_or_false(self.surface, &button).await {
                return self.surface.click(&button, self.timeouts.action()).await;
            }
        }
        Err(E2eError::AssertionFailed(format!(
            "none of the submit buttons {:?} is visible",
            self.selectors.submit_labels
        )))
    }

    /// Filter the table. The backend matches single name tokens only.
    pub async fn search(&self, term: &str) -> E2eResult<()> {
        let input = self.selectors.search_input();
        let action = self.timeouts.action();
        self.surface.fill(&input, term, action).await?;
        self.surface.press(&input, "Enter", action).await?;
        self.surface
            .wait_for_load(LoadState::Load, self.timeouts.navigation())
            .await
    }

    pub async fn verify_exists(&self, full_name: &str) -> E2eResult<()> {
        self.expect(
            &self.selectors.result_link(full_name),
            WaitState::Visible,
            &format!("contact '{}' listed", full_name),
        )
        .await
    }

    pub async fn verify_not_exists(&self) -> E2eResult<()> {
        self.expect(
            &self.selectors.empty_state(),
            WaitState::Visible,
            "empty search result",
        )
        .await
    }

    pub async fn find_and_verify_exists(&self, term: &str, full_name: &str) -> E2eResult<()> {
        self.search(term).await?;
        self.verify_exists(full_name).await
    }

    pub async fn find_and_verify_not_exists(&self, term: &str) -> E2eResult<()> {
        self.search(term).await?;
        self.verify_not_exists().await
    }

    /// Open a listed record's detail page.
    pub async fn open_record(&self, full_name: &str) -> E2eResult<()> {
        self.surface
            .click(&self.selectors.result_link(full_name), self.timeouts.action())
            .await?;
        self.expect(
            &self.selectors.detail_heading(),
            WaitState::Visible,
            "contact detail view",
        )
        .await
    }

    /// From an open detail page, switch to edit mode and save `updated`.
    pub async fn edit(&self, updated: &ContactRecord) -> E2eResult<()> {
        info!("Editing contact to {}", updated.full_name());
        self.surface
            .click(&self.selectors.edit_button(), self.timeouts.action())
            .await?;
        self.fill_form(updated, true).await?;
        self.submit().await?;
        self.expect(
            &self.selectors.detail_heading(),
            WaitState::Visible,
            "contact detail view after edit",
        )
        .await
    }

    /// Delete a listed record through its row's confirmation dialog.
    pub async fn delete(&self, full_name: &str) -> E2eResult<()> {
        info!("Deleting contact {}", full_name);
        let action = self.timeouts.action();
        let control = self.selectors.delete_control(full_name);

        scroll_best_effort(self.surface, &self.selectors.row(full_name), action).await;
        // The control only becomes reliably clickable while hovered.
        self.surface.hover(&control, action).await?;
        self.surface.click(&control, action).await?;

        let dialog = self.selectors.dialog();
        self.expect(&dialog, WaitState::Visible, "delete confirmation dialog")
            .await?;

        // The dialog's submit handler attaches after it is shown; confirming
        // before that posts the form natively and the backend answers 405.
        tokio::time::sleep(self.settle.delete_confirm()).await;

        self.surface
            .click(&self.selectors.confirm_button(), action)
            .await?;
        self.expect(&dialog, WaitState::Hidden, "delete confirmation dialog closed")
            .await
    }

    /// The list does not refresh after mutations on its own.
    pub async fn reload(&self) -> E2eResult<()> {
        self.surface.reload().await?;
        self.surface
            .wait_for_load(LoadState::Load, self.timeouts.navigation())
            .await
    }

    /// Create, find, delete, and confirm the record is gone.
    pub async fn create_and_delete(
        &self,
        navigator: &MenuNavigator<'_>,
        widget: &NavigationTarget,
        record: &ContactRecord,
    ) -> E2eResult<()> {
        navigator.navigate_to(widget).await?;
        self.create(record).await?;

        navigator.navigate_to(widget).await?;
        self.find_and_verify_exists(&record.first_name, &record.full_name())
            .await?;

        self.delete(&record.full_name()).await?;
        self.reload().await?;
        self.find_and_verify_not_exists(&record.first_name).await
    }

    /// Create `original`, edit it into `updated`, and check the list shows
    /// only the new name. Cleans up by deleting the edited record.
    pub async fn edit_round_trip(
        &self,
        navigator: &MenuNavigator<'_>,
        widget: &NavigationTarget,
        original: &ContactRecord,
        updated: &ContactRecord,
    ) -> E2eResult<()> {
        navigator.navigate_to(widget).await?;
        self.create(original).await?;

        navigator.navigate_to(widget).await?;
        self.find_and_verify_exists(&original.first_name, &original.full_name())
            .await?;
        self.open_record(&original.full_name()).await?;
        self.edit(updated).await?;

        navigator.navigate_to(widget).await?;
        self.reload().await?;
        self.find_and_verify_not_exists(&original.first_name).await?;
        self.find_and_verify_exists(&updated.first_name, &updated.full_name())
            .await?;

        self.delete(&updated.full_name()).await
    }
}
