use std::future::Future;
use std::sync::Mutex;

use chatwire_agent::{Agent, AgentError, AgentType, Answer};
use chatwire_types::{
    AskOptions, Backend, BackendError, Capabilities, Capability, FragmentStream, ImageSource,
    Message, Reply, ResponseFormat, Role,
};
use futures::StreamExt;

/// Replies with fixed fragments and records every request it receives.
struct ScriptedBackend {
    fragments: Vec<String>,
    capabilities: Capabilities,
    fail_mid_stream: bool,
    requests: Mutex<Vec<(Vec<Message>, AskOptions)>>,
}

impl ScriptedBackend {
    fn new(fragments: &[&str]) -> Self {
        Self {
            fragments: fragments.iter().map(|s| s.to_string()).collect(),
            capabilities: Capabilities::ALL,
            fail_mid_stream: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    fn requests(&self) -> Vec<(Vec<Message>, AskOptions)> {
        self.requests.lock().unwrap().clone()
    }
}

impl Backend for ScriptedBackend {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn ask(
        &self,
        messages: Vec<Message>,
        options: AskOptions,
    ) -> impl Future<Output = Result<Reply, BackendError>> + Send {
        self.requests
            .lock()
            .unwrap()
            .push((messages, options.clone()));
        let fragments = self.fragments.clone();
        let fail = self.fail_mid_stream;
        async move {
            if !options.stream {
                return Ok(Reply::Text(fragments.concat()));
            }
            let mut items: Vec<Result<String, BackendError>> =
                fragments.into_iter().map(Ok).collect();
            if fail {
                items.insert(1, Err(BackendError::Decode("payload is not valid JSON".into())));
            }
            Ok(Reply::Stream(FragmentStream::new(futures::stream::iter(items))))
        }
    }
}

#[tokio::test]
async fn text_answer_records_user_and_assistant() {
    let backend = ScriptedBackend::new(&["1 + 4 = ", "5"]);
    let mut agent = Agent::new(&backend);

    let answer = agent.ask("What is 1 + 4?", &[], None).await.unwrap();
    assert!(matches!(answer, Answer::Text(ref t) if t == "1 + 4 = 5"));

    assert_eq!(
        agent.history().entries(),
        &[Message::user("What is 1 + 4?"), Message::assistant("1 + 4 = 5")]
    );
}

#[tokio::test]
async fn prompts_are_system_then_history_then_user() {
    let backend = ScriptedBackend::new(&["ok"]);
    let mut agent = Agent::new(&backend)
        .agent_type(AgentType::Planner)
        .additional_instructions("Be brief.")
        .temperature(0.2)
        .format(ResponseFormat::Json);

    let prior = vec![Message::user("hi"), Message::assistant("hello")];
    agent.ask("plan a trip", &[], Some(&prior)).await.unwrap();

    let requests = backend.requests();
    assert_eq!(requests.len(), 1);
    let (messages, options) = &requests[0];
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0].role, Role::System);
    assert!(messages[0].content.starts_with(AgentType::Planner.system_prompt()));
    assert!(messages[0].content.ends_with("Be brief."));
    assert_eq!(&messages[1..3], prior.as_slice());
    assert_eq!(messages[3], Message::user("plan a trip"));
    assert_eq!(options.format, ResponseFormat::Json);
    assert!((options.temperature - 0.2).abs() < f32::EPSILON);
    assert!(!options.stream);

    // prior turns passed in are not copied into the agent's own history
    assert_eq!(agent.history().len(), 2);
}

#[tokio::test]
async fn streamed_answer_records_once_after_the_stream() {
    let backend = ScriptedBackend::new(&["Hel", "lo"]);
    let mut agent = Agent::new(&backend).stream(true);

    {
        let answer = agent.ask("greet me", &[], None).await.unwrap();
        let Answer::Stream(mut stream) = answer else {
            panic!("expected a stream");
        };
        let mut fragments = Vec::new();
        while let Some(fragment) = stream.next().await {
            fragments.push(fragment.unwrap());
        }
        assert_eq!(fragments, vec!["Hel", "lo"]);
    }

    assert_eq!(
        agent.history().entries(),
        &[Message::user("greet me"), Message::assistant("Hello")]
    );
}

#[tokio::test]
async fn streamed_answer_into_text() {
    let backend = ScriptedBackend::new(&["Hel", "lo"]);
    let mut agent = Agent::new(&backend).stream(true);

    let text = agent
        .ask("greet me", &[], None)
        .await
        .unwrap()
        .into_text()
        .await
        .unwrap();
    assert_eq!(text.as_deref(), Some("Hello"));
    assert_eq!(agent.history().len(), 2);
}

#[tokio::test]
async fn failed_stream_records_only_the_user_turn() {
    let mut backend = ScriptedBackend::new(&["A", "B"]);
    backend.fail_mid_stream = true;
    let mut agent = Agent::new(&backend).stream(true);

    let err = agent
        .ask("hi", &[], None)
        .await
        .unwrap()
        .into_text()
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::Decode(_)));
    assert_eq!(agent.history().entries(), &[Message::user("hi")]);
}

#[tokio::test]
async fn unsupported_streaming_is_a_no_op() {
    let mut backend = ScriptedBackend::new(&["never"]);
    backend.capabilities = Capabilities::TEXT_ONLY;
    let mut agent = Agent::new(&backend).stream(true);

    let answer = agent.ask("hi", &[], None).await.unwrap();
    assert!(answer.is_unsupported());
    assert!(matches!(answer, Answer::Unsupported(Capability::Streaming)));
    assert_eq!(answer.into_text().await.unwrap(), None);

    assert!(backend.requests().is_empty());
    assert!(agent.history().is_empty());
}

#[tokio::test]
async fn unsupported_json_and_images() {
    let mut backend = ScriptedBackend::new(&["never"]);
    backend.capabilities = Capabilities {
        streaming: true,
        json_format: false,
        images: false,
    };

    let mut json_agent = Agent::new(&backend).format(ResponseFormat::Json);
    let answer = json_agent.ask("hi", &[], None).await.unwrap();
    assert!(matches!(answer, Answer::Unsupported(Capability::JsonFormat)));

    let mut image_agent = Agent::new(&backend);
    let answer = image_agent
        .ask("what is this?", &["https://example.com/cat.png"], None)
        .await
        .unwrap();
    assert!(matches!(answer, Answer::Unsupported(Capability::Images)));

    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn images_are_attached_to_the_user_message() {
    let backend = ScriptedBackend::new(&["a cat"]);
    let mut agent = Agent::new(&backend);

    agent
        .ask("what is this?", &["https://example.com/cat.png"], None)
        .await
        .unwrap();

    let requests = backend.requests();
    let user = requests[0].0.last().unwrap();
    assert_eq!(
        user.images,
        vec![ImageSource::Url {
            url: "https://example.com/cat.png".into()
        }]
    );
    assert_eq!(agent.history().entries()[0].images.len(), 1);
}

#[test]
fn image_error_names_the_input() {
    let err = AgentError::Image {
        input: "missing.png".into(),
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
    };
    assert_eq!(err.to_string(), "cannot load image missing.png: no such file");
    assert!(std::error::Error::source(&err).is_some());
}

#[tokio::test]
async fn backend_error_propagates() {
    struct Down;

    impl Backend for Down {
        fn ask(
            &self,
            _messages: Vec<Message>,
            _options: AskOptions,
        ) -> impl Future<Output = Result<Reply, BackendError>> + Send {
            async {
                Err(BackendError::Transport {
                    status: 404,
                    body: "no such model".into(),
                })
            }
        }
    }

    let mut agent = Agent::new(Down);
    let err = agent.ask("hi", &[], None).await.unwrap_err();
    assert!(matches!(
        err,
        AgentError::Backend(BackendError::Transport { status: 404, .. })
    ));
    // the user turn was recorded before the call
    assert_eq!(agent.history().entries(), &[Message::user("hi")]);
}
