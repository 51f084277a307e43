use narrative_core::{
    ActorProfile, BindingCriteria, BindingStatus, Echo, EchoDraft, Emotion, EmotionalState,
    NarrativeConfig, NarrativeSession, NewActor, ReactionBinding, ReactionDraft, ResponseStrategy,
};
use story_graph::{keys, EdgeKind, Node, NodeKind};

/// Fixed tension for every actor; never echoes.
struct Flat(f64);

impl ResponseStrategy for Flat {
    fn tension(
        &mut self,
        _actor: &ActorProfile,
        _state: &EmotionalState,
        _stimulus: &Node,
    ) -> f64 {
        self.0
    }

    fn should_echo(&mut self, _actor: &ActorProfile, _stimulus: &Node) -> bool {
        false
    }

    fn compose_reaction(
        &mut self,
        actor: &ActorProfile,
        state: &EmotionalState,
        stimulus: &Node,
        tension: f64,
    ) -> ReactionDraft {
        ReactionDraft {
            content: format!("{} answers \"{}\"", actor.name, stimulus.content),
            emotion: EmotionalState::new(actor.baseline_tone, tension, state.stability),
        }
    }

    fn compose_echo(
        &mut self,
        _actor: &ActorProfile,
        state: &EmotionalState,
        _stimulus: &Node,
    ) -> EchoDraft {
        EchoDraft {
            content: String::new(),
            emotion: state.clone(),
            criteria: BindingCriteria::default(),
        }
    }
}

fn session(tension: f64) -> NarrativeSession {
    NarrativeSession::with_strategy(NarrativeConfig::default(), Box::new(Flat(tension))).unwrap()
}

#[test]
fn scenario_a_echo_binds_to_the_question_it_anticipated() {
    let mut session = session(0.0);
    let echo = Echo::new(
        "you're about to ask about her",
        BindingCriteria::new(0.7, 1.0).with_keywords(["elena", "her"]),
        3,
    );
    let echo_id = session.register_echo(echo).unwrap();
    assert_eq!(session.current_turn(), 0);
    assert_eq!(session.active_echoes()[0].expires_at_turn, 3);

    let report = session.play_turn("What happened to Elena?", "user").unwrap();
    assert_eq!(report.turn, 1);
    assert_eq!(report.bound_echoes.len(), 1);

    let binding = &report.bound_echoes[0];
    assert_eq!(binding.echo_id, echo_id);
    // 1/8 * 0.7 + 0.5 * 1.0 + 1/2 * 0.3, against a threshold of about 0.63
    assert!((binding.score - 0.7375).abs() < 1e-9);

    let edge = session
        .graph()
        .edge(echo_id, report.stimulus_id, EdgeKind::Causal)
        .unwrap();
    assert!((edge.weight - binding.score).abs() < 1e-9);
    assert_eq!(edge.attributes.get_str(keys::BINDING_TYPE), Some("premonition"));
    assert_eq!(session.bound_echoes().len(), 1);
    assert!(session.active_echoes().is_empty());
}

#[test]
fn realized_echo_moves_its_actor_toward_the_echo_emotion() {
    let mut session = session(0.0);
    let mira = session.create_actor(NewActor::named("Mira"));
    let echo = Echo::new(
        "you're about to ask about her",
        BindingCriteria::new(0.7, 1.0).with_keywords(["elena", "her"]),
        3,
    )
    .with_actor(mira)
    .with_emotion(EmotionalState::new(Emotion::Fear, 0.8, 0.9));
    session.register_echo(echo).unwrap();
    let fear_before = session.actor(mira).unwrap().tone.weight(Emotion::Fear);

    let report = session.play_turn("What happened to Elena?", "user").unwrap();
    assert_eq!(report.bound_echoes.len(), 1);
    assert_eq!(report.reactions.len(), 1);
    assert_eq!(report.reactions[0].actor_id, Some(mira));

    let profile = session.actor(mira).unwrap();
    assert!(profile.tone.weight(Emotion::Fear) > fear_before);
    assert_eq!(profile.baseline_tone, Emotion::Fear);
    assert_eq!(session.emotional_state(mira).unwrap().dominant, Emotion::Fear);
}

#[test]
fn scenario_b_selecting_one_variant_leaves_the_other_bound() {
    let mut session = session(0.95);
    let mira = session.create_actor(NewActor::named("Mira"));
    let grieving = session.fork_actor(mira, "grieving").unwrap();

    let stimulus = session.play_turn("The funeral bells ring", "user").unwrap();
    let aside = session.play_turn("A crow lands on the gate", "user").unwrap();
    assert_eq!(stimulus.reactions.len(), 2);

    let from = |actor| {
        stimulus
            .reactions
            .iter()
            .find(|r| r.actor_id == Some(actor))
            .map(|r| r.id)
            .unwrap()
    };
    let chosen = from(mira);
    let other = from(grieving);

    assert_eq!(session.select_reaction(chosen).unwrap(), stimulus.stimulus_id);

    let record = session.binding_record(stimulus.stimulus_id).unwrap();
    assert_eq!(record.status, BindingStatus::Resolved);
    assert_eq!(record.selected_reaction_id, Some(chosen));
    assert_eq!(record.bound_reaction_ids, vec![chosen, other]);
    assert_eq!(
        session.binding_record(aside.stimulus_id).unwrap().status,
        BindingStatus::Pending
    );

    let graph = session.graph();
    let selected = graph
        .edge(stimulus.stimulus_id, chosen, EdgeKind::Causal)
        .unwrap();
    assert_eq!(selected.weight, 1.0);
    assert_eq!(selected.attributes.get_bool(keys::SELECTED), Some(true));
    let untouched = graph
        .edge(stimulus.stimulus_id, other, EdgeKind::Causal)
        .unwrap();
    assert_eq!(untouched.attributes.get_bool(keys::SELECTED), None);
    assert!((untouched.weight - 0.95).abs() < 1e-9);
}

#[test]
fn scenario_c_repeated_mutation_keeps_tone_normalized() {
    let mut session = session(0.0);
    let ives = session.create_actor(NewActor::named("Ives"));

    for _ in 0..5 {
        session
            .apply_mutation(ives, &EmotionalState::new(Emotion::Sadness, 0.9, 0.8))
            .unwrap();
        let tone = &session.actor(ives).unwrap().tone;
        assert!((tone.total() - 1.0).abs() < 1e-9, "total {}", tone.total());
    }
    assert_eq!(session.actor(ives).unwrap().tone.dominant(), Emotion::Sadness);
}

#[test]
fn scenario_d_early_reaction_is_folded_into_a_similar_stimulus() {
    let mut session = session(0.0);
    let (reaction_id, binding) = session
        .submit_reaction("the lighthouse keeper vanished at dawn", None, None, None)
        .unwrap();
    assert_eq!(binding, ReactionBinding::Deferred);

    let report = session
        .play_turn("the lighthouse keeper vanished at midnight", "user")
        .unwrap();
    assert_eq!(report.folded, vec![reaction_id]);

    let edge = session
        .graph()
        .edge(report.stimulus_id, reaction_id, EdgeKind::Causal)
        .unwrap();
    assert!((edge.weight - 5.0 / 7.0).abs() < 1e-9);
    assert_eq!(edge.attributes.get_str(keys::BINDING_TYPE), Some("deferred"));
    assert_eq!(session.reactions_for_stimulus(report.stimulus_id), vec![reaction_id]);
}

#[test]
fn stimuli_forks_and_reverse_bindings_share_one_graph() {
    let mut session = session(0.95);
    let mira = session.create_actor(NewActor::named("Mira"));

    let report = session.play_turn("Where were you last night?", "user").unwrap();
    let reaction = report.reactions[0].id;

    let fork = session.fork_stimulus(report.stimulus_id).unwrap();
    let fork_node = session.node(fork).unwrap();
    assert_eq!(fork_node.kind, NodeKind::Stimulus);
    assert_eq!(
        fork_node.attributes.get_str(keys::FORKED_FROM),
        Some(report.stimulus_id.to_string().as_str())
    );
    assert!(session.reactions_for_stimulus(fork).is_empty());

    let prompt = session
        .create_reverse_binding(reaction, "Why do you keep asking?")
        .unwrap();
    assert!(session
        .graph()
        .edge(reaction, prompt, EdgeKind::ReverseBinding)
        .is_some());
    assert_eq!(session.reactions_for_stimulus(prompt), vec![reaction]);

    // Anchor and reaction carry the actor; stimuli never do.
    assert_eq!(session.nodes_by_actor(mira).len(), 2);
    assert_eq!(session.nodes_by_kind(NodeKind::Stimulus).len(), 3);
    assert_eq!(session.canonical_path()[0], session.actor(mira).unwrap().memory_anchor);

    let memory = session.traverse_memory(mira, None, 10).unwrap();
    assert_eq!(memory.first(), Some(&session.actor(mira).unwrap().memory_anchor));
    assert!(memory.contains(&reaction));
}

#[test]
fn same_seed_replays_the_same_story() {
    let play = || {
        let mut config = NarrativeConfig::default();
        config.seed = 42;
        config.actors.default_echo_probability = 0.5;
        let mut session = NarrativeSession::new(config).unwrap();
        session.create_actor(NewActor::named("Mira"));
        session.create_actor(NewActor::named("Ives").with_threshold(0.3));

        let mut transcript = Vec::new();
        for line in [
            "Mira finds a letter",
            "The letter is unsigned",
            "Ives burns the letter",
            "Mira asks about the letter",
        ] {
            let report = session.play_turn(line, "user").unwrap();
            for reaction in &report.reactions {
                transcript.push(reaction.content.clone());
            }
            transcript.push(format!(
                "turn {} echoes {} bound {} expired {}",
                report.turn,
                report.echoes.len(),
                report.bound_echoes.len(),
                report.expired_echoes.len()
            ));
        }
        transcript
    };

    assert_eq!(play(), play());
}
