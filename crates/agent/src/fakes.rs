//! In-memory fakes for the capability traits, shared by tests across the
//! workspace.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use outdial_core::domain::workflow::{DemoRequest, SummaryOutput};
use outdial_core::phone::NormalizedPhone;

use crate::capabilities::{
    CapabilityError, CrmClient, ObjectStore, OutboundDialer, TranscriptionJob,
    TranscriptionService, WorkflowClient,
};
use crate::llm::{GenerationError, GenerationRequest, TextGenerator};

#[derive(Default)]
pub struct FakeTextGenerator {
    scripted: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
}

impl FakeTextGenerator {
    pub fn push_response(&self, text: &str) {
        self.scripted.lock().unwrap().push_back(Ok(text.to_owned()));
    }

    pub fn fail_next(&self) {
        self.scripted.lock().unwrap().push_back(Err("scripted generation failure".to_owned()));
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl TextGenerator for FakeTextGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        self.prompts.lock().unwrap().push(request.user.clone());
        match self.scripted.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(GenerationError::Transport(message)),
            None => Ok("(generated)".to_owned()),
        }
    }
}

#[derive(Clone, Debug)]
struct FakeLead {
    id: String,
    phone: String,
    last_name: String,
}

#[derive(Default)]
pub struct FakeCrmClient {
    leads: Mutex<Vec<FakeLead>>,
    deleted: Mutex<Vec<String>>,
    updates: Mutex<Vec<(String, String)>>,
    cases: Mutex<Vec<(String, String)>>,
    sequence: AtomicUsize,
}

impl FakeCrmClient {
    pub fn seed_lead(&self, id: &str, phone_e164: &str, last_name: &str) {
        self.leads.lock().unwrap().push(FakeLead {
            id: id.to_owned(),
            phone: phone_e164.to_owned(),
            last_name: last_name.to_owned(),
        });
    }

    pub fn deleted_leads(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn updates(&self) -> Vec<(String, String)> {
        self.updates.lock().unwrap().clone()
    }

    pub fn cases(&self) -> Vec<(String, String)> {
        self.cases.lock().unwrap().clone()
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.sequence.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[async_trait]
impl CrmClient for FakeCrmClient {
    async fn find_lead_by_phone(
        &self,
        phone: &NormalizedPhone,
    ) -> Result<Option<String>, CapabilityError> {
        Ok(self
            .leads
            .lock()
            .unwrap()
            .iter()
            .find(|lead| lead.phone == phone.as_e164())
            .map(|lead| lead.id.clone()))
    }

    async fn create_lead(
        &self,
        _first_name: &str,
        last_name: &str,
        phone: &NormalizedPhone,
    ) -> Result<String, CapabilityError> {
        let id = self.next_id("lead");
        self.leads.lock().unwrap().push(FakeLead {
            id: id.clone(),
            phone: phone.as_e164().to_owned(),
            last_name: last_name.to_owned(),
        });
        Ok(id)
    }

    async fn update_lead(
        &self,
        lead_id: &str,
        description: &str,
    ) -> Result<(), CapabilityError> {
        self.updates.lock().unwrap().push((lead_id.to_owned(), description.to_owned()));
        Ok(())
    }

    async fn find_and_delete_lead(
        &self,
        phone: &NormalizedPhone,
        last_name: &str,
    ) -> Result<bool, CapabilityError> {
        let mut leads = self.leads.lock().unwrap();
        let position = leads
            .iter()
            .position(|lead| lead.phone == phone.as_e164() && lead.last_name == last_name);
        match position {
            Some(index) => {
                let removed = leads.remove(index);
                self.deleted.lock().unwrap().push(removed.id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn create_case(
        &self,
        subject: &str,
        description: &str,
    ) -> Result<String, CapabilityError> {
        self.cases.lock().unwrap().push((subject.to_owned(), description.to_owned()));
        Ok(self.next_id("case"))
    }
}

#[derive(Clone, Debug)]
pub struct DialedCall {
    pub destination: String,
    pub source: String,
    pub attributes: BTreeMap<String, String>,
    pub contact_id: String,
}

#[derive(Default)]
pub struct FakeOutboundDialer {
    calls: Mutex<Vec<DialedCall>>,
    next_contact_id: Mutex<Option<String>>,
    sequence: AtomicUsize,
}

impl FakeOutboundDialer {
    pub fn set_next_contact_id(&self, contact_id: &str) {
        *self.next_contact_id.lock().unwrap() = Some(contact_id.to_owned());
    }

    pub fn calls(&self) -> Vec<DialedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl OutboundDialer for FakeOutboundDialer {
    async fn start_call(
        &self,
        destination: &str,
        source: &str,
        attributes: &BTreeMap<String, String>,
    ) -> Result<String, CapabilityError> {
        let contact_id = self.next_contact_id.lock().unwrap().take().unwrap_or_else(|| {
            format!("contact-{}", self.sequence.fetch_add(1, Ordering::SeqCst) + 1)
        });
        self.calls.lock().unwrap().push(DialedCall {
            destination: destination.to_owned(),
            source: source.to_owned(),
            attributes: attributes.clone(),
            contact_id: contact_id.clone(),
        });
        Ok(contact_id)
    }
}

#[derive(Clone, Debug)]
pub struct StartedTranscriptionJob {
    pub job_name: String,
    pub media_uri: String,
    pub media_format: String,
    pub language_code: String,
}

#[derive(Default)]
pub struct FakeTranscriptionService {
    jobs: Mutex<HashMap<String, TranscriptionJob>>,
    started: Mutex<Vec<StartedTranscriptionJob>>,
}

impl FakeTranscriptionService {
    pub fn seed_job(&self, job_name: &str, job: TranscriptionJob) {
        self.jobs.lock().unwrap().insert(job_name.to_owned(), job);
    }

    pub fn started_jobs(&self) -> Vec<StartedTranscriptionJob> {
        self.started.lock().unwrap().clone()
    }
}

#[async_trait]
impl TranscriptionService for FakeTranscriptionService {
    async fn start_job(
        &self,
        job_name: &str,
        media_uri: &str,
        media_format: &str,
        language_code: &str,
    ) -> Result<(), CapabilityError> {
        self.started.lock().unwrap().push(StartedTranscriptionJob {
            job_name: job_name.to_owned(),
            media_uri: media_uri.to_owned(),
            media_format: media_format.to_owned(),
            language_code: language_code.to_owned(),
        });
        Ok(())
    }

    async fn get_job(&self, job_name: &str) -> Result<TranscriptionJob, CapabilityError> {
        self.jobs
            .lock()
            .unwrap()
            .get(job_name)
            .cloned()
            .ok_or_else(|| CapabilityError::request("transcription", format!("no job `{job_name}`")))
    }
}

#[derive(Default)]
pub struct FakeObjectStore {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
    fetches: AtomicUsize,
}

impl FakeObjectStore {
    pub fn seed_object(&self, bucket: &str, key: &str, bytes: Vec<u8>) {
        self.objects.lock().unwrap().insert((bucket.to_owned(), key.to_owned()), bytes);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for FakeObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, CapabilityError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_owned(), key.to_owned()))
            .cloned()
            .ok_or_else(|| CapabilityError::request("storage", format!("no object `{bucket}/{key}`")))
    }
}

#[derive(Default)]
pub struct FakeWorkflowClient {
    executions: Mutex<Vec<DemoRequest>>,
    successes: Mutex<Vec<(String, SummaryOutput)>>,
    failures: Mutex<Vec<(String, String, String)>>,
}

impl FakeWorkflowClient {
    pub fn executions(&self) -> Vec<DemoRequest> {
        self.executions.lock().unwrap().clone()
    }

    pub fn successes(&self) -> Vec<(String, SummaryOutput)> {
        self.successes.lock().unwrap().clone()
    }

    pub fn failures(&self) -> Vec<(String, String, String)> {
        self.failures.lock().unwrap().clone()
    }
}

#[async_trait]
impl WorkflowClient for FakeWorkflowClient {
    async fn start_execution(&self, input: &DemoRequest) -> Result<(), CapabilityError> {
        self.executions.lock().unwrap().push(input.clone());
        Ok(())
    }

    async fn send_task_success(
        &self,
        task_token: &str,
        output: &SummaryOutput,
    ) -> Result<(), CapabilityError> {
        self.successes.lock().unwrap().push((task_token.to_owned(), output.clone()));
        Ok(())
    }

    async fn send_task_failure(
        &self,
        task_token: &str,
        error: &str,
        cause: &str,
    ) -> Result<(), CapabilityError> {
        self.failures
            .lock()
            .unwrap()
            .push((task_token.to_owned(), error.to_owned(), cause.to_owned()));
        Ok(())
    }
}
