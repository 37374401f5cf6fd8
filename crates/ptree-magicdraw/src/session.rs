//! Per-run extraction state.

use std::{collections::HashMap, rc::Rc};

use log::debug;

use ptree_core::product::{RelationRecord, Requirement};

use crate::{
    error::ExtractError,
    gateway::{ElementGateway, ElementRecord},
    retry::{CancellationFlag, RetryPolicy},
};

/// State owned by one extraction run.
///
/// The session memoizes fetched elements, resolved requirements (keyed by
/// the supplier element id, since many products trace to the same
/// requirement) and counterpart relation records. Call [`reset`] before
/// building an unrelated tree with the same session.
///
/// [`reset`]: BuildSession::reset
pub struct BuildSession<'g> {
    gateway: &'g dyn ElementGateway,
    retry: RetryPolicy,
    cancel: CancellationFlag,
    elements: HashMap<String, Rc<ElementRecord>>,
    requirements: HashMap<String, Requirement>,
    counterparts: HashMap<String, RelationRecord>,
    products_processed: usize,
}

impl<'g> BuildSession<'g> {
    pub fn new(gateway: &'g dyn ElementGateway) -> Self {
        Self {
            gateway,
            retry: RetryPolicy::default(),
            cancel: CancellationFlag::new(),
            elements: HashMap::new(),
            requirements: HashMap::new(),
            counterparts: HashMap::new(),
            products_processed: 0,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation(&self) -> &CancellationFlag {
        &self.cancel
    }

    /// Fetches an element through the cache, retrying on rate limiting.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::Cancelled`] if the run was cancelled, or the
    /// retry policy's error when the fetch cannot complete.
    pub fn fetch(&mut self, element_id: &str) -> Result<Rc<ElementRecord>, ExtractError> {
        self.cancel.check()?;
        if let Some(record) = self.elements.get(element_id) {
            return Ok(Rc::clone(record));
        }

        let gateway = self.gateway;
        let record = Rc::new(
            self.retry
                .run(element_id, &self.cancel, || gateway.fetch(element_id))?,
        );
        self.elements
            .insert(element_id.to_string(), Rc::clone(&record));
        Ok(record)
    }

    pub fn cached_requirement(&self, supplier_id: &str) -> Option<&Requirement> {
        self.requirements.get(supplier_id)
    }

    pub fn cache_requirement(&mut self, supplier_id: &str, requirement: Requirement) {
        self.requirements
            .insert(supplier_id.to_string(), requirement);
    }

    pub fn cached_counterpart(&self, class_id: &str) -> Option<&RelationRecord> {
        self.counterparts.get(class_id)
    }

    pub fn cache_counterpart(&mut self, class_id: &str, record: RelationRecord) {
        self.counterparts.insert(class_id.to_string(), record);
    }

    /// Counts one finalized product.
    pub fn record_product(&mut self) -> usize {
        self.products_processed += 1;
        self.products_processed
    }

    pub fn products_processed(&self) -> usize {
        self.products_processed
    }

    /// Clears every cache and counter. The gateway, retry policy and
    /// cancellation flag are kept.
    pub fn reset(&mut self) {
        debug!(
            elements = self.elements.len(),
            requirements = self.requirements.len(),
            products = self.products_processed;
            "Resetting build session"
        );
        self.elements.clear();
        self.requirements.clear();
        self.counterparts.clear();
        self.products_processed = 0;
    }
}
