//! Behavioural tests for request dispatch.

use std::cell::RefCell;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

use crate::dispatch::{Response, ResponseState};

use super::support::{Harness, Script, request_body, states};

#[derive(Default)]
struct DispatchWorld {
    catalog: String,
    script: Script,
    harness: Option<Harness>,
}

impl DispatchWorld {
    fn process(&mut self, body: Option<String>) {
        let harness = Harness::new(&self.catalog, self.script.clone());
        harness.queues.requests.push_body(body);
        assert_eq!(harness.listener.poll_once(), 1);
        self.harness = Some(harness);
    }

    fn harness(&self) -> &Harness {
        self.harness.as_ref().expect("a message should have been processed")
    }

    fn responses(&self) -> Vec<Response> {
        self.harness().responses()
    }
}

#[fixture]
fn dispatch() -> RefCell<DispatchWorld> {
    RefCell::new(DispatchWorld::default())
}

fn list(value: &str) -> Vec<String> {
    value
        .trim_matches('"')
        .split(',')
        .filter(|item| !item.is_empty())
        .map(str::to_owned)
        .collect()
}

fn parse_state(value: &str) -> ResponseState {
    match value {
        "started" => ResponseState::Started,
        "working" => ResponseState::Working,
        "success" => ResponseState::Success,
        "failure" => ResponseState::Failure,
        other => panic!("unknown response state '{other}'"),
    }
}

#[given("a catalog defining {job} with stacks {stacks}")]
fn given_catalog(dispatch: &RefCell<DispatchWorld>, job: String, stacks: String) {
    let mut yaml = format!("{}:\n  bang-stacks:\n", job.trim_matches('"'));
    for stack in list(&stacks) {
        yaml.push_str(&format!("    - {stack}\n"));
    }
    dispatch.borrow_mut().catalog.push_str(&yaml);
}

#[given("an engine that reports progress {lines}")]
fn given_progress_engine(dispatch: &RefCell<DispatchWorld>, lines: String) {
    dispatch.borrow_mut().script = Script::Progress(list(&lines));
}

#[given("an engine that fails with {message}")]
fn given_failing_engine(dispatch: &RefCell<DispatchWorld>, message: String) {
    dispatch.borrow_mut().script = Script::Fail(message.trim_matches('"').to_owned());
}

#[when("request {request_id} for {job} arrives with parameters {parameters}")]
fn when_request_with_parameters(
    dispatch: &RefCell<DispatchWorld>,
    request_id: String,
    job: String,
    parameters: String,
) {
    let parameters = list(&parameters);
    let parameters: Vec<&str> = parameters.iter().map(String::as_str).collect();
    let body = request_body(
        job.trim_matches('"'),
        request_id.trim_matches('"'),
        Some(&parameters),
    );
    dispatch.borrow_mut().process(Some(body));
}

#[when("request {request_id} for {job} arrives")]
fn when_request(dispatch: &RefCell<DispatchWorld>, request_id: String, job: String) {
    let body = request_body(job.trim_matches('"'), request_id.trim_matches('"'), None);
    dispatch.borrow_mut().process(Some(body));
}

#[when("a message with an empty body arrives")]
fn when_empty_body(dispatch: &RefCell<DispatchWorld>) {
    dispatch.borrow_mut().process(Some(String::new()));
}

#[then("the published states are {expected}")]
fn then_states(dispatch: &RefCell<DispatchWorld>, expected: String) {
    let expected: Vec<_> = list(&expected).iter().map(|state| parse_state(state)).collect();
    assert_eq!(states(&dispatch.borrow().responses()), expected);
}

#[then("every response names job {job} and request {request_id}")]
fn then_identity(dispatch: &RefCell<DispatchWorld>, job: String, request_id: String) {
    for response in dispatch.borrow().responses() {
        assert_eq!(response.job_name(), job.trim_matches('"'));
        assert_eq!(response.request_id(), request_id.trim_matches('"'));
    }
}

#[then("the final message contains {text}")]
fn then_final_message(dispatch: &RefCell<DispatchWorld>, text: String) {
    let responses = dispatch.borrow().responses();
    let last = responses.last().expect("at least one response");
    let text = text.trim_matches('"');
    assert!(
        last.message().contains(text),
        "'{}' does not contain '{text}'",
        last.message()
    );
}

#[then("the message was acknowledged once")]
fn then_acknowledged_once(dispatch: &RefCell<DispatchWorld>) {
    assert_eq!(dispatch.borrow().harness().queues.requests.deleted().len(), 1);
}

#[then("the engine received parameters {parameters}")]
fn then_engine_parameters(dispatch: &RefCell<DispatchWorld>, parameters: String) {
    let calls = dispatch.borrow().harness().engine.calls();
    let (job, _) = calls.first().expect("engine should have run");
    assert_eq!(job.parameters(), Some(list(&parameters).as_slice()));
}

#[then("the engine was never invoked")]
fn then_engine_idle(dispatch: &RefCell<DispatchWorld>) {
    assert!(dispatch.borrow().harness().engine.calls().is_empty());
}

#[scenario(path = "tests/features/dispatch.feature")]
fn request_dispatch(#[from(dispatch)] dispatch: RefCell<DispatchWorld>) {
    let _ = dispatch;
}
