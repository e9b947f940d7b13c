//! The promotion service: campaign versioning, voucher issuance, offer
//! selection and the reserve/commit/rollback lifecycle.

use std::cmp::Reverse;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};

use offerly_core::discount::StrategyFactory;
use offerly_core::domain::fact::Fact;
use offerly_core::domain::offer::DiscountApplication;
use offerly_core::domain::template::{
    DiscountType, PromotionTemplate, TemplateDraft, TemplateGroupId, TemplateId, TemplateRevision,
};
use offerly_core::domain::voucher::{Voucher, VoucherDraft, VoucherId, VoucherStatus};
use offerly_core::errors::{DiscountError, DomainError};
use offerly_core::rules::RuleEngine;
use offerly_db::{TemplateRepository, VoucherRepository};

use crate::errors::ServiceError;
use crate::requests::{
    BatchIssueRequest, CreateTemplateRequest, IssueVoucherRequest, OfferSelection,
    UpdateTemplateRequest, VoucherActionRequest,
};

/// Stateless facade over the two repositories. Cloning is cheap and every
/// clone shares the same collaborators, including the compiled-rule cache.
#[derive(Clone)]
pub struct PromotionService {
    templates: Arc<dyn TemplateRepository>,
    vouchers: Arc<dyn VoucherRepository>,
    rules: Arc<dyn RuleEngine>,
    strategies: StrategyFactory,
}

/// A voucher whose template rule matched the fact.
struct Matched {
    voucher: Voucher,
    template: PromotionTemplate,
}

struct Candidate {
    matched: Matched,
    application: DiscountApplication,
}

impl Candidate {
    /// Larger benefit first, then the oldest template, then the oldest voucher.
    fn rank(&self) -> (Reverse<i64>, TemplateId, VoucherId) {
        (Reverse(self.application.amount), self.matched.template.id, self.matched.voucher.id)
    }

    fn into_selection(self) -> OfferSelection {
        OfferSelection {
            application: self.application,
            voucher_id: Some(self.matched.voucher.id),
            coupon_code: Some(self.matched.voucher.coupon_code),
            template_id: Some(self.matched.template.id),
        }
    }
}

impl PromotionService {
    pub fn new(
        templates: Arc<dyn TemplateRepository>,
        vouchers: Arc<dyn VoucherRepository>,
        rules: Arc<dyn RuleEngine>,
    ) -> Self {
        Self { templates, vouchers, rules, strategies: StrategyFactory::new() }
    }

    pub fn rule_engine(&self) -> &dyn RuleEngine {
        self.rules.as_ref()
    }

    pub async fn create_template(
        &self,
        request: CreateTemplateRequest,
    ) -> Result<PromotionTemplate, ServiceError> {
        let discount_type = self.check_definition(
            &request.discount_type,
            &request.discount_properties,
            &request.rule_definition,
            request.start_date,
            request.end_date,
        )?;

        let template = self
            .templates
            .create(TemplateDraft {
                group_id: TemplateGroupId::generate(),
                version: 1,
                name: request.name,
                description: request.description,
                promotion_type: request.promotion_type,
                rule_definition: request.rule_definition,
                discount_type,
                discount_properties: request.discount_properties,
                start_date: request.start_date,
                end_date: request.end_date,
                is_exclusive: request.is_exclusive,
                priority: request.priority,
                is_active: true,
            })
            .await?;

        info!(
            event_name = "templates.created",
            template_id = %template.id,
            group_id = %template.group_id,
            "promotion template created"
        );
        Ok(template)
    }

    /// Deactivates the latest version of the group and writes its successor.
    ///
    /// The two writes are not atomic: a concurrent revision of the same group
    /// can leave two active versions, or briefly none.
    pub async fn update_template(
        &self,
        request: UpdateTemplateRequest,
    ) -> Result<PromotionTemplate, ServiceError> {
        let discount_type = self.check_definition(
            &request.discount_type,
            &request.discount_properties,
            &request.rule_definition,
            request.start_date,
            request.end_date,
        )?;

        let Some(mut latest) = self.templates.find_latest_by_group(&request.group_id).await?
        else {
            return Err(DomainError::TemplateGroupNotFound(request.group_id.0).into());
        };

        if latest.is_active {
            latest.is_active = false;
            latest.updated_at = Utc::now();
            self.templates.update(latest.clone()).await?;
        }

        let draft = latest.next_version(TemplateRevision {
            name: request.name,
            description: request.description,
            rule_definition: request.rule_definition,
            discount_type,
            discount_properties: request.discount_properties,
            start_date: request.start_date,
            end_date: request.end_date,
            is_exclusive: request.is_exclusive,
            priority: request.priority,
        });
        let template = self.templates.create(draft).await?;

        info!(
            event_name = "templates.revised",
            template_id = %template.id,
            group_id = %template.group_id,
            version = template.version,
            superseded_id = %latest.id,
            "promotion template revised"
        );
        Ok(template)
    }

    /// Succeeds without writing when the group has no active version.
    pub async fn deactivate_template(&self, group_id: &TemplateGroupId) -> Result<(), ServiceError> {
        let Some(mut active) = self.templates.find_active_by_group(group_id).await? else {
            debug!(
                event_name = "templates.deactivate.noop",
                group_id = %group_id,
                "no active template version to deactivate"
            );
            return Ok(());
        };

        active.is_active = false;
        active.updated_at = Utc::now();
        let template_id = active.id;
        self.templates.update(active).await?;

        info!(
            event_name = "templates.deactivated",
            template_id = %template_id,
            group_id = %group_id,
            "promotion template deactivated"
        );
        Ok(())
    }

    pub async fn get_template(
        &self,
        id: TemplateId,
    ) -> Result<Option<PromotionTemplate>, ServiceError> {
        Ok(self.templates.find_by_id(id).await?)
    }

    pub async fn get_active_template(
        &self,
        group_id: &TemplateGroupId,
    ) -> Result<Option<PromotionTemplate>, ServiceError> {
        Ok(self.templates.find_active_by_group(group_id).await?)
    }

    pub async fn issue(&self, request: IssueVoucherRequest) -> Result<Voucher, ServiceError> {
        let now = Utc::now();
        let template = match self.templates.find_by_id(request.template_id).await? {
            None => return Err(template_invalid(request.template_id, "template not found")),
            Some(template) if !template.is_active => {
                return Err(template_invalid(template.id, "template is inactive"));
            }
            Some(template) if template.has_ended(now) => {
                let reason = format!("template ended at {}", template.end_date.to_rfc3339());
                return Err(template_invalid(template.id, reason));
            }
            Some(template) => template,
        };

        let voucher = self
            .vouchers
            .save(VoucherDraft::unused(request.user_id, template.id, now, template.end_date))
            .await?;

        info!(
            event_name = "vouchers.issued",
            voucher_id = %voucher.id,
            template_id = %template.id,
            user_id = voucher.user_id,
            coupon_code = %voucher.coupon_code,
            "voucher issued"
        );
        Ok(voucher)
    }

    /// Issues one voucher per user concurrently. Every branch runs to
    /// completion; the first failure observed is returned and vouchers that
    /// were already issued stay in place.
    pub async fn batch_issue(&self, request: BatchIssueRequest) -> Result<Vec<Voucher>, ServiceError> {
        let mut tasks = JoinSet::new();
        for (index, user_id) in request.user_ids.iter().copied().enumerate() {
            let service = self.clone();
            let issue = IssueVoucherRequest { template_id: request.template_id, user_id };
            tasks.spawn(async move { (index, service.issue(issue).await) });
        }

        let mut issued = Vec::with_capacity(request.user_ids.len());
        let mut first_error: Option<ServiceError> = None;
        while let Some(joined) = tasks.join_next().await {
            let outcome = match joined {
                Ok((index, Ok(voucher))) => {
                    issued.push((index, voucher));
                    continue;
                }
                Ok((_, Err(error))) => error,
                Err(error) => task_failed(error),
            };
            if first_error.is_none() {
                first_error = Some(outcome);
            }
        }

        if let Some(error) = first_error {
            warn!(
                event_name = "vouchers.batch.failed",
                template_id = %request.template_id,
                requested = request.user_ids.len(),
                issued = issued.len(),
                error_class = error.class(),
                error = %error,
                "batch issuance failed"
            );
            return Err(error);
        }

        issued.sort_by_key(|(index, _)| *index);
        info!(
            event_name = "vouchers.batch.issued",
            template_id = %request.template_id,
            issued = issued.len(),
            "batch issuance completed"
        );
        Ok(issued.into_iter().map(|(_, voucher)| voucher).collect())
    }

    /// Picks the single most valuable offer among the user's available
    /// vouchers. Finding nothing is not an error.
    pub async fn select_best_offer(&self, fact: &Fact) -> Result<OfferSelection, ServiceError> {
        let user_id = fact.user.id;
        let available = self.available_vouchers(user_id, Utc::now()).await?;
        let scanned = available.len();

        let fact = Arc::new(fact.clone());
        let mut tasks = JoinSet::new();
        for voucher in available {
            let service = self.clone();
            let fact = Arc::clone(&fact);
            tasks.spawn(async move { service.evaluate_candidate(voucher, &fact).await });
        }

        let mut best: Option<Candidate> = None;
        while let Some(joined) = tasks.join_next().await {
            let Some(candidate) = joined.map_err(task_failed)? else {
                continue;
            };
            if !candidate.application.is_benefit() {
                continue;
            }
            if best.as_ref().map_or(true, |current| candidate.rank() < current.rank()) {
                best = Some(candidate);
            }
        }

        let selection = best.map_or_else(OfferSelection::no_offer, Candidate::into_selection);
        info!(
            event_name = "offers.best.selected",
            user_id,
            scanned,
            amount = selection.application.amount,
            coupon_code = selection.coupon_code.as_ref().map(|code| code.0.as_str()),
            "best offer evaluated"
        );
        Ok(selection)
    }

    /// Every available voucher of `user_id` whose rule matches, newest first.
    pub async fn list_applicable(
        &self,
        fact: &Fact,
        user_id: i64,
    ) -> Result<Vec<Voucher>, ServiceError> {
        let available = self.available_vouchers(user_id, Utc::now()).await?;

        let fact = Arc::new(fact.clone());
        let mut tasks = JoinSet::new();
        for voucher in available {
            let service = self.clone();
            let fact = Arc::clone(&fact);
            tasks.spawn(async move { service.match_voucher(voucher, &fact).await });
        }

        let mut applicable = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            if let Some(matched) = joined.map_err(task_failed)? {
                applicable.push(matched.voucher);
            }
        }
        applicable.sort_by(|left, right| right.id.cmp(&left.id));

        debug!(
            event_name = "offers.applicable.listed",
            user_id,
            applicable = applicable.len(),
            "applicable vouchers listed"
        );
        Ok(applicable)
    }

    /// Reserve: `Unused -> Frozen`.
    pub async fn freeze(&self, request: VoucherActionRequest) -> Result<Voucher, ServiceError> {
        let mut voucher = self.owned_voucher(&request).await?;
        if voucher.status == VoucherStatus::Unused && voucher.is_expired(Utc::now()) {
            return Err(DomainError::VoucherExpired(voucher.coupon_code).into());
        }

        voucher.freeze()?;
        self.vouchers.update(voucher.clone()).await?;

        info!(
            event_name = "vouchers.lifecycle.frozen",
            voucher_id = %voucher.id,
            user_id = voucher.user_id,
            coupon_code = %voucher.coupon_code,
            "voucher frozen"
        );
        Ok(voucher)
    }

    /// Commit: `Frozen -> Used`.
    pub async fn use_voucher(&self, request: VoucherActionRequest) -> Result<Voucher, ServiceError> {
        let mut voucher = self.owned_voucher(&request).await?;
        voucher.confirm(Utc::now())?;
        self.vouchers.update(voucher.clone()).await?;

        info!(
            event_name = "vouchers.lifecycle.used",
            voucher_id = %voucher.id,
            user_id = voucher.user_id,
            coupon_code = %voucher.coupon_code,
            "voucher used"
        );
        Ok(voucher)
    }

    /// Rollback: `Frozen -> Unused`, a successful no-op from any other state.
    pub async fn unfreeze(&self, request: VoucherActionRequest) -> Result<Voucher, ServiceError> {
        let mut voucher = self.owned_voucher(&request).await?;
        if !voucher.unfreeze() {
            debug!(
                event_name = "vouchers.lifecycle.unfreeze_noop",
                voucher_id = %voucher.id,
                status = voucher.status.as_str(),
                "voucher not frozen; nothing to roll back"
            );
            return Ok(voucher);
        }

        self.vouchers.update(voucher.clone()).await?;
        info!(
            event_name = "vouchers.lifecycle.unfrozen",
            voucher_id = %voucher.id,
            user_id = voucher.user_id,
            coupon_code = %voucher.coupon_code,
            "voucher unfrozen"
        );
        Ok(voucher)
    }

    fn check_definition(
        &self,
        tag: &str,
        discount_properties: &str,
        rule_definition: &str,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> Result<DiscountType, ServiceError> {
        if end_date < start_date {
            return Err(DomainError::InvariantViolation(format!(
                "end date {} precedes start date {}",
                end_date.to_rfc3339(),
                start_date.to_rfc3339()
            ))
            .into());
        }

        let discount_type = DiscountType::parse(tag)
            .ok_or_else(|| DiscountError::UnsupportedDiscountType(tag.to_string()))?;
        self.strategies.strategy_for(discount_type).validate(discount_properties)?;
        self.rules.validate(rule_definition)?;
        Ok(discount_type)
    }

    async fn available_vouchers(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<Voucher>, ServiceError> {
        let held = self.vouchers.find_by_user_id(user_id).await?;
        Ok(held.into_iter().filter(|voucher| voucher.is_available(now)).collect())
    }

    async fn owned_voucher(&self, request: &VoucherActionRequest) -> Result<Voucher, ServiceError> {
        match self.vouchers.find_by_code(&request.coupon_code).await? {
            Some(voucher) if voucher.user_id == request.user_id => Ok(voucher),
            _ => Err(DomainError::VoucherNotFound {
                code: request.coupon_code.clone(),
                user_id: request.user_id,
            }
            .into()),
        }
    }

    /// Never fails: a template that cannot be loaded or a failing rule only
    /// removes this voucher from consideration.
    async fn match_voucher(&self, voucher: Voucher, fact: &Fact) -> Option<Matched> {
        let template = match self.templates.find_by_id(voucher.template_id).await {
            Ok(Some(template)) => template,
            Ok(None) => {
                warn!(
                    event_name = "offers.scan.template_missing",
                    voucher_id = %voucher.id,
                    template_id = %voucher.template_id,
                    "voucher references a missing template; skipping"
                );
                return None;
            }
            Err(error) => {
                warn!(
                    event_name = "offers.scan.template_failed",
                    voucher_id = %voucher.id,
                    template_id = %voucher.template_id,
                    error = %error,
                    "template lookup failed; skipping voucher"
                );
                return None;
            }
        };

        match self.rules.evaluate(&template.rule_definition, fact) {
            Ok(true) => Some(Matched { voucher, template }),
            Ok(false) => {
                debug!(
                    event_name = "offers.scan.rule_unmatched",
                    voucher_id = %voucher.id,
                    template_id = %template.id,
                    "rule did not match"
                );
                None
            }
            Err(error) => {
                warn!(
                    event_name = "offers.scan.rule_failed",
                    voucher_id = %voucher.id,
                    template_id = %template.id,
                    engine = self.rules.name(),
                    error = %error,
                    "rule evaluation failed; skipping voucher"
                );
                None
            }
        }
    }

    async fn evaluate_candidate(&self, voucher: Voucher, fact: &Fact) -> Option<Candidate> {
        let matched = self.match_voucher(voucher, fact).await?;
        self.price(&matched, fact).map(|application| Candidate { matched, application })
    }

    fn price(&self, matched: &Matched, fact: &Fact) -> Option<DiscountApplication> {
        let strategy = self.strategies.strategy_for(matched.template.discount_type);
        match strategy.calculate(fact, &matched.template) {
            Ok(application) => Some(application),
            Err(error) => {
                warn!(
                    event_name = "offers.scan.strategy_failed",
                    voucher_id = %matched.voucher.id,
                    template_id = %matched.template.id,
                    strategy = strategy.name(),
                    error = %error,
                    "discount calculation failed; skipping voucher"
                );
                None
            }
        }
    }
}

fn template_invalid(template_id: TemplateId, reason: impl Into<String>) -> ServiceError {
    DomainError::TemplateInvalid { template_id, reason: reason.into() }.into()
}

fn task_failed(error: JoinError) -> ServiceError {
    ServiceError::TaskFailed(error.to_string())
}
