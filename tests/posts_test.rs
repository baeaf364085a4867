mod common;

use common::{client, id_of, TestServer};
use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};

#[tokio::test]
async fn create_post_returns_every_post_newest_first() {
    let server = TestServer::start().await;
    let (ada, user) = server.user("Ada", "ada@example.com").await;

    let form = Form::new()
        .text("description", "an old post")
        .text("created_at", "2020-01-01T00:00:00Z");
    let resp = ada
        .post(server.url("/posts"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    server.post(&ada, "a new post").await;

    let posts: Value = client()
        .get(server.url("/posts"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let posts = posts.as_array().unwrap();
    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0]["content"], "a new post");
    assert_eq!(posts[1]["content"], "an old post");
    assert_eq!(posts[1]["created_at"], "2020-01-01 00:00:00");
    assert_eq!(posts[1]["user_id"], user["id"]);
    assert_eq!(posts[1]["firstName"], "Ada");
    assert_eq!(posts[1]["likes"], json!([]));
}

#[tokio::test]
async fn create_post_validates_input() {
    let server = TestServer::start().await;
    let (ada, _) = server.user("Ada", "ada@example.com").await;

    let resp = client()
        .post(server.url("/posts"))
        .multipart(Form::new().text("description", "hi"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = ada
        .post(server.url("/posts"))
        .multipart(Form::new().text("description", "   "))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Content is required");

    let resp = ada
        .post(server.url("/posts"))
        .multipart(
            Form::new()
                .text("description", "hi")
                .text("created_at", "last tuesday"),
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = ada
        .post(server.url("/posts"))
        .multipart(
            Form::new()
                .text("description", "hi")
                .part("picturePath", Part::bytes(b"#!/bin/sh".to_vec()).file_name("run.sh")),
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn post_image_is_stored_and_served() {
    let server = TestServer::start().await;
    let (ada, _) = server.user("Ada", "ada@example.com").await;

    let form = Form::new().text("description", "look").part(
        "picturePath",
        Part::bytes(b"GIF89a".to_vec()).file_name("../../cat.gif"),
    );
    let posts: Value = ada
        .post(server.url("/posts"))
        .multipart(form)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(posts[0]["picturePath"], "cat.gif");

    let resp = client()
        .get(server.url("/assets/cat.gif"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "image/gif");
}

#[tokio::test]
async fn user_posts_only_lists_that_author() {
    let server = TestServer::start().await;
    let (ada, ada_user) = server.user("Ada", "ada@example.com").await;
    let (bob, _) = server.user("Bob", "bob@example.com").await;
    server.post(&ada, "from ada").await;
    server.post(&bob, "from bob").await;

    let posts: Value = client()
        .get(server.url(&format!("/users/{}/posts", id_of(&ada_user))))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(posts.as_array().unwrap().len(), 1);
    assert_eq!(posts[0]["content"], "from ada");

    let resp = client()
        .get(server.url("/users/nobody/posts"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn liking_twice_is_rejected_and_reactions_are_exclusive() {
    let server = TestServer::start().await;
    let (ada, _) = server.user("Ada", "ada@example.com").await;
    let (bob, bob_user) = server.user("Bob", "bob@example.com").await;
    let post_id = server.post(&ada, "hello").await;

    let dislike_url = server.url(&format!("/posts/{}/dislike", post_id));
    let like_url = server.url(&format!("/posts/{}/like", post_id));

    let resp = bob.patch(&dislike_url).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["dislikes"], 1);

    let resp = bob.patch(&like_url).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["likes"], 1);
    assert_eq!(body["dislikes"], 0);

    let resp = bob.patch(&like_url).send().await.unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "User already liked the post");

    let posts: Value = client()
        .get(server.url("/posts"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(posts[0]["likes"], json!([bob_user["id"]]));
    assert_eq!(posts[0]["dislikes"], json!([]));

    let resp = bob
        .patch(server.url("/posts/missing/like"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn comments_are_created_and_listed() {
    let server = TestServer::start().await;
    let (ada, _) = server.user("Ada", "ada@example.com").await;
    let (bob, bob_user) = server.user("Bob", "bob@example.com").await;
    let post_id = server.post(&ada, "hello").await;

    let resp = bob
        .post(server.url(&format!("/posts/{}/comment", post_id)))
        .json(&json!({ "content": "nice post" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["comment"]["userId"], bob_user["id"]);
    assert_eq!(body["comment"]["firstName"], "Bob");

    // Form-encoded bodies are accepted too
    let resp = ada
        .post(server.url(&format!("/posts/{}/comment", post_id)))
        .form(&[("content", "thanks")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let resp = bob
        .post(server.url(&format!("/posts/{}/comment", post_id)))
        .json(&json!({ "content": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = bob
        .post(server.url("/posts/missing/comment"))
        .json(&json!({ "content": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let comments: Value = client()
        .get(server.url(&format!("/posts/{}/comments", post_id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let comments = comments.as_array().unwrap();
    assert_eq!(comments.len(), 2);
    assert_eq!(comments[0]["content"], "nice post");
    assert_eq!(comments[1]["content"], "thanks");
}

#[tokio::test]
async fn deleting_a_post_removes_its_reactions_and_comments() {
    let server = TestServer::start().await;
    let (ada, _) = server.user("Ada", "ada@example.com").await;
    let (bob, _) = server.user("Bob", "bob@example.com").await;
    let (cy, _) = server.user("Cy", "cy@example.com").await;
    let post_id = server.post(&ada, "doomed").await;
    server.post(&ada, "survivor").await;

    bob.patch(server.url(&format!("/posts/{}/like", post_id)))
        .send()
        .await
        .unwrap();
    cy.patch(server.url(&format!("/posts/{}/dislike", post_id)))
        .send()
        .await
        .unwrap();
    bob.post(server.url(&format!("/posts/{}/comment", post_id)))
        .json(&json!({ "content": "first" }))
        .send()
        .await
        .unwrap();

    let resp = bob
        .delete(server.url(&format!("/posts/{}", post_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
    assert_eq!(server.count("posts", "id", &post_id), 1);

    let resp = ada
        .post(server.url(&format!("/delete/{}", post_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let remaining: Value = resp.json().await.unwrap();
    assert_eq!(remaining.as_array().unwrap().len(), 1);
    assert_eq!(remaining[0]["content"], "survivor");

    assert_eq!(server.count("posts", "id", &post_id), 0);
    assert_eq!(server.count("comments", "post_id", &post_id), 0);
    assert_eq!(server.count("post_likes", "post_id", &post_id), 0);
    assert_eq!(server.count("post_dislikes", "post_id", &post_id), 0);

    let resp = ada
        .delete(server.url(&format!("/posts/{}", post_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Post not found");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_likes_never_fail_with_a_server_error() {
    let server = TestServer::start().await;
    let (ada, _) = server.user("Ada", "ada@example.com").await;
    let (bob, _) = server.user("Bob", "bob@example.com").await;

    let mut post_ids = Vec::new();
    for i in 0..5 {
        post_ids.push(server.post(&ada, &format!("post {}", i)).await);
    }

    let requests = post_ids.iter().flat_map(|post_id| {
        let url = server.url(&format!("/posts/{}/like", post_id));
        let bob = bob.clone();
        (0..12).map(move |_| {
            let bob = bob.clone();
            let url = url.clone();
            tokio::spawn(async move { bob.patch(&url).send().await.unwrap().status() })
        })
    });
    let statuses: Vec<u16> = futures::future::join_all(requests)
        .await
        .into_iter()
        .map(|status| status.unwrap().as_u16())
        .collect();

    assert!(
        statuses.iter().all(|s| *s == 200 || *s == 400),
        "unexpected statuses: {:?}",
        statuses
    );
    assert_eq!(statuses.iter().filter(|s| **s == 200).count(), post_ids.len());
    for post_id in &post_ids {
        assert_eq!(server.count("post_likes", "post_id", post_id), 1);
    }
}
