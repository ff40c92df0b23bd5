//! Server persistence for records and sets.
//!
//! Every operation builds a [`Request`] and hands it to a [`Transport`]
//! together with a [`Completion`]. Outcomes are reported through events:
//!
//! - `"request"` as soon as the request has been handed off
//! - `"sync"` once the server's answer has been applied
//! - `"error"` when the transport reports a failure
//!
//! The operations return as soon as the request is sent. Nothing is applied
//! until the transport completes.

use crate::collection::{Entry, RecordSet, entries_from};
use crate::error::{ModelError, ModelResult};
use crate::options::Options;
use crate::payload::{Payload, Target};
use crate::record::Record;
use serde_json::Value;
use spine_events::Emits;
use spine_sync::{Completion, Request, RequestHandle, SyncConfig, SyncMethod, Transport};
use spine_types::{Attributes, into_attributes};
use std::rc::Rc;
use tracing::{debug, warn};

/// Runs after a successful save has been applied, before `"sync"`.
pub(crate) type AfterSave = Box<dyn FnOnce(&Record, &Options)>;

struct Outgoing {
    target: Target,
    transport: Rc<dyn Transport>,
    config: SyncConfig,
    method: SyncMethod,
    url: String,
    payload: Option<Value>,
}

fn dispatch<F>(out: Outgoing, options: Options, on_success: F) -> ModelResult<RequestHandle>
where
    F: FnOnce(Value, Options) + 'static,
{
    let config = out
        .config
        .with_overrides(options.emulate_http, options.emulate_json);
    let request = Request::build(out.method, out.url, out.payload.as_ref(), &config)?;
    debug!(
        method = %out.method,
        http_method = %request.http_method,
        url = %request.url,
        "sending request"
    );

    let success_options = options.clone();
    let error_options = options.clone();
    let error_target = out.target.clone();
    let completion = Completion::new(
        move |response| on_success(response, success_options),
        move |error| {
            warn!(error = %error, "request failed");
            error_target.events().trigger(
                "error",
                &Payload::Failed {
                    target: error_target.clone(),
                    error: Rc::new(error),
                    options: error_options,
                },
            );
        },
    );

    let handle = out.transport.send(request.clone(), completion);
    out.target.events().trigger(
        "request",
        &Payload::Request {
            target: out.target.clone(),
            request,
            options,
        },
    );
    Ok(handle)
}

fn synced(target: Target, response: Value, options: Options) {
    target.events().trigger(
        "sync",
        &Payload::Synced {
            target: target.clone(),
            response,
            options,
        },
    );
}

impl Record {
    fn outgoing(
        &self,
        method: SyncMethod,
        url: String,
        payload: Option<Value>,
    ) -> ModelResult<Outgoing> {
        let transport = self
            .schema()
            .transport()
            .cloned()
            .or_else(|| self.collection().and_then(|set| set.transport()))
            .ok_or(ModelError::MissingTransport)?;
        Ok(Outgoing {
            target: Target::Record(self.clone()),
            transport,
            config: self.schema().sync_config(),
            method,
            url,
            payload,
        })
    }

    fn request_url(&self, options: &Options, attrs: &Attributes) -> ModelResult<String> {
        match &options.url {
            Some(url) => Ok(url.clone()),
            None => self.url_for(attrs),
        }
    }

    fn server_attrs(&self, response: Value, options: &Options) -> Attributes {
        if options.parses() {
            return self.parse(response, options);
        }
        into_attributes(response).unwrap_or_else(|e| {
            warn!(cid = %self.cid(), error = %e, "ignoring server data");
            Attributes::new()
        })
    }

    /// Reads the record from the server and applies the response.
    pub fn fetch(&self, options: Options) -> ModelResult<RequestHandle> {
        let options = options.or_defaults(false, true);
        let url = self.request_url(&options, &self.attributes())?;
        let out = self.outgoing(SyncMethod::Read, url, None)?;
        let record = self.clone();
        dispatch(out, options, move |response, options| {
            let attrs = record.server_attrs(response.clone(), &options);
            if record.set(attrs, &options) {
                synced(Target::Record(record), response, options);
            }
        })
    }

    /// Sends the record to the server: create when new, otherwise a full
    /// update, or a patch of `attrs` alone with `patch`.
    ///
    /// Without `wait`, `attrs` are applied before the request goes out.
    /// With `wait` they are only validated, sent, and applied together with
    /// the response. Returns `Ok(None)` when validation fails.
    pub fn save(&self, attrs: Option<Attributes>, options: Options) -> ModelResult<Option<RequestHandle>> {
        self.save_then(attrs, options, None)
    }

    pub(crate) fn save_then(
        &self,
        attrs: Option<Attributes>,
        options: Options,
        after: Option<AfterSave>,
    ) -> ModelResult<Option<RequestHandle>> {
        let mut options = options.or_defaults(true, true);
        let wait = options.wait;

        let accepted = match &attrs {
            Some(attrs) if !wait => self.set(attrs.clone(), &options),
            Some(attrs) => self.validate_with(attrs, &options),
            None => self.validate_with(&Attributes::new(), &options),
        };
        if !accepted {
            return Ok(None);
        }

        // With `wait` the request describes the record as it will be once
        // the server accepts it.
        let mut view = self.attributes();
        if wait {
            if let Some(attrs) = &attrs {
                view.extend(attrs.clone());
            }
        }
        let is_new = !view
            .get(self.schema().id_attribute())
            .is_some_and(|id| !id.is_null());
        let method = if is_new {
            SyncMethod::Create
        } else if options.patch {
            SyncMethod::Patch
        } else {
            SyncMethod::Update
        };
        if method == SyncMethod::Patch && options.attrs.is_none() {
            options.attrs = attrs.clone();
        }
        let body = options.attrs.clone().unwrap_or_else(|| view.clone());

        let url = self.request_url(&options, &view)?;
        let out = self.outgoing(method, url, Some(Value::Object(body)))?;
        let record = self.clone();
        dispatch(out, options, move |response, options| {
            let mut server = record.server_attrs(response.clone(), &options);
            if wait {
                if let Some(mut merged) = attrs {
                    merged.extend(server);
                    server = merged;
                }
            }
            if !record.set(server, &options) {
                return;
            }
            if let Some(after) = after {
                after(&record, &options);
            }
            synced(Target::Record(record), response, options);
        })
        .map(Some)
    }

    /// Deletes the record on the server.
    ///
    /// The record announces `"destroy"` (and leaves its set) right away, or
    /// with `wait` once the server confirms. A record that was never saved
    /// is destroyed locally and `Ok(None)` is returned.
    pub fn destroy(&self, options: Options) -> ModelResult<Option<RequestHandle>> {
        let wait = options.wait;
        if self.is_new() {
            self.finish_destroy(&options);
            return Ok(None);
        }

        let url = self.request_url(&options, &self.attributes())?;
        let out = self.outgoing(SyncMethod::Delete, url, None)?;
        let record = self.clone();
        let handle = dispatch(out, options.clone(), move |response, options| {
            if wait {
                record.finish_destroy(&options);
            }
            synced(Target::Record(record), response, options);
        })?;
        if !wait {
            self.finish_destroy(&options);
        }
        Ok(Some(handle))
    }

    fn finish_destroy(&self, options: &Options) {
        debug!(cid = %self.cid(), "destroyed");
        self.stop_listening();
        self.trigger(
            "destroy",
            &Payload::Destroyed {
                record: self.clone(),
                collection: self.collection(),
                options: options.clone(),
            },
        );
    }
}

impl RecordSet {
    /// Reads the set from the server and reconciles it with the response,
    /// or replaces every member with `reset`.
    pub fn fetch(&self, options: Options) -> ModelResult<RequestHandle> {
        let options = options.or_defaults(false, true);
        let url = match &options.url {
            Some(url) => url.clone(),
            None => self
                .url()
                .map(str::to_owned)
                .ok_or(ModelError::MissingUrl)?,
        };
        let out = Outgoing {
            target: Target::Set(self.clone()),
            transport: self.transport().ok_or(ModelError::MissingTransport)?,
            config: self.schema().sync_config(),
            method: SyncMethod::Read,
            url,
            payload: None,
        };
        let set = self.clone();
        dispatch(out, options, move |response, options| {
            let entries = if options.parses() {
                set.parse(response.clone())
            } else {
                entries_from(response.clone())
            };
            if options.reset {
                set.reset(entries, &options);
            } else {
                set.set(entries, &options);
            }
            synced(Target::Set(set), response, options);
        })
    }

    /// Builds a member from `entry` and saves it.
    ///
    /// Without `wait` the record joins the set immediately; with `wait` it
    /// joins once the server confirms. Returns `Ok(None)` when the entry
    /// fails validation.
    pub fn create(&self, entry: impl Into<Entry>, options: Options) -> ModelResult<Option<Record>> {
        let Some(record) = self.prepare(entry.into(), &options) else {
            return Ok(None);
        };
        if !options.wait {
            self.add([record.clone()], &options);
        }
        let after = options.wait.then(|| {
            let set = self.clone();
            Box::new(move |record: &Record, options: &Options| {
                set.add([record.clone()], options);
            }) as AfterSave
        });
        record.save_then(None, options, after)?;
        Ok(Some(record))
    }
}
